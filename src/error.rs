//! Centralized error type for the rollnet umbrella crate.
//!
//! Wraps both subsystem errors so `?` propagates across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Roll: {0}")]
    Roll(#[from] rollnet_roll::Error),

    #[cfg(feature = "model")]
    #[error("Model: {0}")]
    Model(#[from] rollnet_burn::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
