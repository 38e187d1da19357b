//! Rule-based track classification.
//!
//! Each [`TrackKind`] has one rule: a name-substring match against a curated
//! list, combined with a program-number range or the drum flag. Rules are
//! evaluated in [`TrackKind::PRIORITY`] order and the first match wins. A track
//! no rule accepts is reported as [`Error::UnclassifiedTrack`].

use crate::error::{Error, Result};
use crate::file::MidiTrack;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument family of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Piano,
    Bass,
    Drums,
    Other,
}

impl TrackKind {
    /// Evaluation order of the classification rules.
    pub const PRIORITY: [TrackKind; 4] = [
        TrackKind::Piano,
        TrackKind::Bass,
        TrackKind::Drums,
        TrackKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Piano => "piano",
            Self::Bass => "bass",
            Self::Drums => "drums",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range of General MIDI program numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRange {
    pub min: u8,
    pub max: u8,
}

impl ProgramRange {
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, program: u8) -> bool {
        (self.min..=self.max).contains(&program)
    }
}

/// Name lists and program ranges used by the rules.
///
/// Names are matched as substrings of the normalized track name, so entries
/// should be lower-case and contain only letters and spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub piano_names: Vec<String>,
    pub bass_names: Vec<String>,
    pub drum_names: Vec<String>,
    pub other_names: Vec<String>,
    pub piano_programs: ProgramRange,
    pub bass_programs: ProgramRange,
    pub other_programs: ProgramRange,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            piano_names: names(&["piano", "accoustic piano", "guitar", "flutevibes"]),
            bass_names: names(&["bass", "fretless bass"]),
            drum_names: names(&["drums", "congos", "cymbals", "hits"]),
            other_names: names(&[
                "trumpet",
                "alto",
                "tenor",
                "trombone",
                "he harmonica",
                "she flute",
            ]),
            piano_programs: ProgramRange::new(0, 31),
            bass_programs: ProgramRange::new(32, 39),
            other_programs: ProgramRange::new(40, 127),
        }
    }
}

/// Per-file count of tracks in each family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackAnalysis {
    pub piano: usize,
    pub bass: usize,
    pub drums: usize,
    pub other: usize,
}

impl TrackAnalysis {
    pub fn record(&mut self, kind: TrackKind) {
        match kind {
            TrackKind::Piano => self.piano += 1,
            TrackKind::Bass => self.bass += 1,
            TrackKind::Drums => self.drums += 1,
            TrackKind::Other => self.other += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.piano + self.bass + self.drums + self.other
    }
}

/// Lower-case `text` and drop everything except letters and spaces.
pub fn normalize_name(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic() || *c == ' ')
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct TrackClassifier {
    config: ClassifierConfig,
}

impl TrackClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn name_matches(list: &[String], track: &MidiTrack) -> bool {
        let name = normalize_name(&track.name);
        list.iter().any(|n| name.contains(n.as_str()))
    }

    pub fn is_piano(&self, track: &MidiTrack) -> bool {
        self.config.piano_programs.contains(track.program)
            || Self::name_matches(&self.config.piano_names, track)
    }

    pub fn is_bass(&self, track: &MidiTrack) -> bool {
        Self::name_matches(&self.config.bass_names, track)
            || self.config.bass_programs.contains(track.program)
    }

    pub fn is_drum(&self, track: &MidiTrack) -> bool {
        Self::name_matches(&self.config.drum_names, track) || track.is_drum
    }

    pub fn is_other(&self, track: &MidiTrack) -> bool {
        Self::name_matches(&self.config.other_names, track)
            || self.config.other_programs.contains(track.program)
    }

    /// Whether the rule for `kind` accepts `track`.
    pub fn matches(&self, kind: TrackKind, track: &MidiTrack) -> bool {
        match kind {
            TrackKind::Piano => self.is_piano(track),
            TrackKind::Bass => self.is_bass(track),
            TrackKind::Drums => self.is_drum(track),
            TrackKind::Other => self.is_other(track),
        }
    }

    /// First matching kind in priority order.
    pub fn classify(&self, track: &MidiTrack) -> Result<TrackKind> {
        TrackKind::PRIORITY
            .into_iter()
            .find(|kind| self.matches(*kind, track))
            .ok_or_else(|| {
                let name = normalize_name(&track.name);
                tracing::error!(
                    "Unable to classify track '{}' (program {}); add the name to the classifier lists",
                    name,
                    track.program
                );
                Error::UnclassifiedTrack {
                    name,
                    program: track.program,
                }
            })
    }

    /// Classify every track, failing on the first unclassifiable one.
    pub fn analyze(&self, tracks: &[MidiTrack]) -> Result<TrackAnalysis> {
        let mut analysis = TrackAnalysis::default();
        for track in tracks {
            analysis.record(self.classify(track)?);
        }
        Ok(analysis)
    }

    /// Whether a track contributes to the piano roll.
    ///
    /// Piano-like tracks that also match the drum, bass or other rules are dropped.
    pub fn keep_for_roll(&self, track: &MidiTrack) -> bool {
        !(self.is_drum(track) || self.is_bass(track) || self.is_other(track))
            && self.is_piano(track)
    }
}
