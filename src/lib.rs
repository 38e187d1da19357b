//! # rollnet - piano-roll note prediction
//!
//! Turns MIDI files into boolean piano rolls, trains a sequence model to
//! predict the next time step, and writes rolls back out as MIDI.
//!
//! ## Architecture
//!
//! rollnet is an umbrella crate that coordinates:
//! - **rollnet-roll** - MIDI loading, track classification, pitch windowing,
//!   vectorization, augmentation and MIDI export
//! - **rollnet-burn** - Conv1d/LSTM network, training loop, model artifacts
//!   and generation on [Burn](https://burn.dev)
//!
//! ## Quick Start
//!
//! ```ignore
//! use rollnet::prelude::*;
//!
//! let mut corpus = MidiCorpus::new(RollConfig::new(60))?;
//! corpus.load_midi(&["songs/a.mid", "songs/b.mid"])?;
//! corpus.augment(4, DEFAULT_V_STEP)?;
//!
//! let mut model = SequenceModel::<CpuBackend>::new("gru", "models", Default::default());
//! let roll = corpus.roll().ok_or(rollnet::roll::Error::NoRoll)?;
//! rollnet::train_on_roll(&mut model, roll, 96, 1, TrainConfig::default())?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Roll pipeline and model
//! - `model` - Burn sequence model (burn + wgpu)

mod error;

pub use error::{Error, Result};

/// Re-export of rollnet-roll for direct access
pub use rollnet_roll as roll;

pub use rollnet_roll::{
    augment, export, vectorize, ClassifierConfig, CutReport, FileOutcome, FileReport, LoadReport,
    MidiCorpus, PianoRoll, PitchConfig, PitchWindow, RollBuilder, RollConfig, TrackAnalysis,
    TrackClassifier, TrackKind, DEFAULT_V_STEP,
};

#[cfg(feature = "model")]
pub use rollnet_burn as model;

#[cfg(feature = "model")]
pub use rollnet_burn::{
    AutodiffBackend, BackendPool, BackendTask, CpuBackend, DevicePlacement, EarlyStopping,
    GpuBackend, LossKind, ModelArtifact, ModelState, NetworkConfig, SequenceModel, TrainConfig,
    Trainer, TrainingHistory,
};

#[cfg(feature = "model")]
mod pipeline;

#[cfg(feature = "model")]
pub use pipeline::{generate_roll, train_on_roll};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{MidiCorpus, PianoRoll, PitchConfig, RollConfig, TrackKind, DEFAULT_V_STEP};

    #[cfg(feature = "model")]
    pub use crate::{
        generate_roll, train_on_roll, BackendPool, CpuBackend, GpuBackend, LossKind,
        NetworkConfig, SequenceModel, TrainConfig,
    };
}
