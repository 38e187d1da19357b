//! Error types for the sequence model.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Model has not been built or loaded")]
    NotBuilt,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Failed to record model: {0}")]
    Record(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Model metadata error: {0}")]
    Metadata(String),

    #[error("Tensor error: {0}")]
    Tensor(String),

    #[error("Backend init error: {0}")]
    BackendInit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<burn::record::RecorderError> for Error {
    fn from(e: burn::record::RecorderError) -> Self {
        Error::Record(format!("{e:?}"))
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Metadata(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Metadata(e.to_string())
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(e: ndarray::ShapeError) -> Self {
        Error::Shape(e.to_string())
    }
}
