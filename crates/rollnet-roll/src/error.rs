//! Error types for the piano-roll pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI parse error: {0}")]
    MidiFileParse(String),

    #[error("Unsupported MIDI timing format")]
    MidiUnsupportedTiming,

    /// No classification rule matched. Fatal for the whole batch.
    #[error("Unable to classify track '{name}' (program {program}); add its name to the classifier lists")]
    UnclassifiedTrack { name: String, program: u8 },

    #[error("Roll is {width} pitches wide, more than the {max} MIDI pitches")]
    RollTooWide { width: usize, max: usize },

    #[error("Roll width mismatch: expected {expected}, found {found}")]
    WidthMismatch { expected: usize, found: usize },

    /// A multitrack quantized at a different resolution than the batch.
    #[error("{file} is quantized at {found} steps per beat, expected {expected}")]
    ResolutionMismatch {
        file: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid roll: {0}")]
    InvalidRoll(String),

    #[error("No roll loaded")]
    NoRoll,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl From<midly::Error> for Error {
    fn from(e: midly::Error) -> Self {
        Error::MidiFileParse(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
