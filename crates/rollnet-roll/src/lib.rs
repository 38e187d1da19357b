//! Piano-roll data pipeline for rollnet.
//!
//! Reads MIDI files, keeps the piano parts, and turns them into boolean
//! time-by-pitch rolls ready for sequence-model training:
//!
//! - [`classify`] sorts tracks into piano, bass, drums or other
//! - [`RollBuilder`] merges the piano tracks of many files into one roll,
//!   optionally cut to a pitch window
//! - [`vectorize`](vectorize::vectorize) slices a roll into (phrase, next step) pairs
//! - [`augment`](augment::augment) stacks circularly pitch-shifted copies
//! - [`export`] writes rolls back to Standard MIDI Files
//!
//! ```rust,ignore
//! let mut corpus = MidiCorpus::new(RollConfig::new(60))?;
//! corpus.load_midi(&["caravan.mid"])?;
//! corpus.augment(4, 5)?;
//! let (phrases, labels) = corpus.vectorize(96, 1)?;
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{PitchConfig, RollConfig};

pub mod classify;
pub use classify::{ClassifierConfig, ProgramRange, TrackAnalysis, TrackClassifier, TrackKind};

pub(crate) mod file;
pub use file::{
    Multitrack, MidiTrack, NoteSpan, ParsedMidiFile, TempoChange, DEFAULT_TEMPO_BPM,
};

pub mod roll;
pub use roll::{concat_time, CutReport, PianoRoll, PitchWindow};

mod builder;
pub use builder::{FileOutcome, FileReport, LoadReport, RollBuilder};

pub mod augment;
pub mod export;
pub mod vectorize;

mod corpus;
pub use corpus::{MidiCorpus, DEFAULT_V_STEP};
