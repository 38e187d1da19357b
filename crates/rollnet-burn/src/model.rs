//! Model wrapper tying the network, its artifact and training together.

use crate::artifact::ModelArtifact;
use crate::batch;
use crate::error::{Error, Result};
use crate::network::{NetworkConfig, SequenceNetwork};
use crate::trainer::{TrainConfig, Trainer, TrainingHistory};
use burn::module::{AutodiffModule, Module};
use burn::tensor::backend::AutodiffBackend;
use ndarray::{Array2, ArrayView2, ArrayView3};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Rows per forward pass in [`SequenceModel::predict`].
const PREDICT_BATCH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unbuilt,
    Built,
}

struct Built<B: AutodiffBackend> {
    network: SequenceNetwork<B>,
    config: NetworkConfig,
}

/// A named model that trains into `<model_dir>/<name>.mpk`.
pub struct SequenceModel<B: AutodiffBackend> {
    name: String,
    model_dir: PathBuf,
    device: B::Device,
    built: Option<Built<B>>,
}

impl<B: AutodiffBackend> SequenceModel<B> {
    pub fn new(name: impl Into<String>, model_dir: impl Into<PathBuf>, device: B::Device) -> Self {
        Self {
            name: name.into(),
            model_dir: model_dir.into(),
            device,
            built: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn state(&self) -> ModelState {
        if self.built.is_some() {
            ModelState::Built
        } else {
            ModelState::Unbuilt
        }
    }

    pub fn config(&self) -> Option<&NetworkConfig> {
        self.built.as_ref().map(|b| &b.config)
    }

    pub fn network(&self) -> Option<&SequenceNetwork<B>> {
        self.built.as_ref().map(|b| &b.network)
    }

    /// Where [`train`](Self::train) saves.
    pub fn artifact(&self) -> ModelArtifact {
        ModelArtifact::new(&self.model_dir, &self.name)
    }

    /// Fresh network for `(lookback, num_pitches)` phrases.
    pub fn build(&mut self, config: NetworkConfig) -> Result<()> {
        let network = config.init::<B>(&self.device)?;
        info!(
            "Built {} with lookback {}, {} pitches, {} parameters, loss {}",
            self.name,
            config.lookback,
            config.num_pitches,
            network.num_params(),
            config.loss
        );
        self.built = Some(Built { network, config });
        Ok(())
    }

    /// Adopt an externally constructed network.
    pub fn set_model(&mut self, network: SequenceNetwork<B>, config: NetworkConfig) {
        warn!("Network set externally, make sure its shapes match the training data");
        self.built = Some(Built { network, config });
    }

    /// Replace the current network with a saved one.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let (network, config) = ModelArtifact::from_path(path).load::<B>(&self.device)?;
        self.built = Some(Built { network, config });
        Ok(())
    }

    /// Save to `path`; returns the weights file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let built = self.built.as_ref().ok_or(Error::NotBuilt)?;
        ModelArtifact::from_path(path).save(&built.network, &built.config)
    }

    /// Fit on `(x, y)` with `config`, then save to [`artifact`](Self::artifact).
    pub fn train(
        &mut self,
        x: ArrayView3<'_, bool>,
        y: ArrayView2<'_, bool>,
        config: TrainConfig,
    ) -> Result<TrainingHistory> {
        self.train_with(x, y, &mut Trainer::new(config))
    }

    /// Same as [`train`](Self::train) with a caller-configured trainer.
    pub fn train_with(
        &mut self,
        x: ArrayView3<'_, bool>,
        y: ArrayView2<'_, bool>,
        trainer: &mut Trainer,
    ) -> Result<TrainingHistory> {
        let artifact = self.artifact();
        let built = self.built.as_mut().ok_or(Error::NotBuilt)?;

        let start = Instant::now();
        let (network, outcome) =
            trainer.fit(built.network.clone(), &built.config, x, y, &self.device)?;
        let elapsed = start.elapsed();
        built.network = network;

        let weights = artifact.save(&built.network, &built.config)?;
        info!("Full train took {:.2} minutes", elapsed.as_secs_f64() / 60.0);

        Ok(TrainingHistory {
            epochs: outcome.epochs,
            stopped_early: outcome.stopped_early,
            elapsed,
            artifact: Some(weights),
        })
    }

    /// Next-step probabilities `(samples, num_pitches)` for phrases `x`.
    pub fn predict(&self, x: ArrayView3<'_, bool>) -> Result<Array2<f32>> {
        let built = self.built.as_ref().ok_or(Error::NotBuilt)?;
        let (samples, lookback, pitches) = x.dim();
        if (lookback, pitches) != (built.config.lookback, built.config.num_pitches) {
            return Err(Error::Shape(format!(
                "phrases are {lookback}x{pitches}, network expects {}x{}",
                built.config.lookback, built.config.num_pitches
            )));
        }

        let inference = built.network.valid();
        let rows: Vec<usize> = (0..samples).collect();
        let mut probs = Vec::with_capacity(samples * pitches);
        for chunk in rows.chunks(PREDICT_BATCH) {
            let phrases = batch::phrases::<B::InnerBackend>(x, chunk, &self.device);
            let values = inference
                .forward(phrases)
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| Error::Tensor(format!("{e:?}")))?;
            probs.extend(values);
        }
        Ok(Array2::from_shape_vec((samples, pitches), probs)?)
    }
}
