//! Burn sequence model for piano-roll continuation.
//!
//! A [`SequenceModel`] wraps a [`SequenceNetwork`] (1-D convolution feeding
//! three stacked LSTMs and two dense layers) and owns its artifact path. Train
//! it on phrases and next-step labels, then extend a seed roll with
//! [`generate`].
//!
//! ```rust,ignore
//! let pool = BackendPool::cpu_only();
//! let mut model = SequenceModel::<CpuBackend>::new("gru", "models", *pool.cpu_device());
//! model.build(NetworkConfig::new(96, 60))?;
//! let history = model.train(x.view(), y.view(), TrainConfig::default().with_epochs(5))?;
//! let continued = generate(&model, seed.view(), 384, 0.5)?;
//! ```

mod artifact;
mod backend_pool;
mod batch;
mod error;
mod generate;
mod model;
mod network;
mod trainer;

pub use artifact::{ArtifactMetadata, ModelArtifact, METADATA_EXTENSION, WEIGHTS_EXTENSION};
pub use backend_pool::{
    BackendPool, BackendTask, CpuBackend, CpuDevice, DevicePlacement, GpuBackend,
};
pub use error::{Error, Result};
pub use generate::generate;
pub use model::{ModelState, SequenceModel};
pub use network::{
    LossKind, NetworkConfig, SequenceNetwork, CONV_FILTERS, CONV_KERNEL, DENSE_WIDTH, DROPOUT,
    LSTM_WIDTHS,
};
pub use trainer::{
    CallbackAction, EarlyStopping, EpochMetrics, TrainConfig, Trainer, TrainingCallback,
    TrainingHistory,
};

/// Backend bound for anything that trains.
pub use burn::tensor::backend::AutodiffBackend;
