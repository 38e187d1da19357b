//! Minibatch training loop.

use crate::batch;
use crate::error::{Error, Result};
use crate::network::{NetworkConfig, SequenceNetwork};
use burn::optim::{GradientsParams, Optimizer, RmsPropConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use ndarray::{ArrayView2, ArrayView3};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Seeds the per-epoch shuffle.
    pub seed: u64,
    pub shuffle: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 1,
            batch_size: 128,
            learning_rate: 1e-3,
            seed: 42,
            shuffle: true,
        }
    }
}

impl TrainConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be at least 1".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Sample-weighted means over one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    /// 1-based.
    pub epoch: usize,
    pub loss: f64,
    /// Fraction of pitch cells predicted correctly at a 0.5 threshold.
    pub accuracy: f64,
    pub mean_absolute_error: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
    pub stopped_early: bool,
    pub elapsed: Duration,
    /// Weights file written after training.
    pub artifact: Option<PathBuf>,
}

impl TrainingHistory {
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    pub fn best_loss(&self) -> Option<f64> {
        self.epochs.iter().map(|m| m.loss).reduce(f64::min)
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed.as_secs_f64() / 60.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Continue,
    Stop,
}

/// Observes each finished epoch and may end training.
pub trait TrainingCallback {
    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> CallbackAction;
}

/// Stops once the loss has not improved by `min_delta` for `patience` epochs.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    best: Option<f64>,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            min_delta: 0.0,
            best: None,
            wait: 0,
        }
    }

    pub fn with_min_delta(mut self, min_delta: f64) -> Self {
        self.min_delta = min_delta;
        self
    }
}

impl TrainingCallback for EarlyStopping {
    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> CallbackAction {
        match self.best {
            Some(best) if metrics.loss > best - self.min_delta => {
                self.wait += 1;
                if self.wait >= self.patience {
                    info!(
                        "Early stopping at epoch {}, best loss {:.4}",
                        metrics.epoch, best
                    );
                    return CallbackAction::Stop;
                }
            }
            _ => {
                self.best = Some(metrics.loss);
                self.wait = 0;
            }
        }
        CallbackAction::Continue
    }
}

/// RMSprop over shuffled minibatches.
pub struct Trainer {
    config: TrainConfig,
    callbacks: Vec<Box<dyn TrainingCallback>>,
}

/// Result of [`Trainer::fit`] before it is wrapped into a history.
pub(crate) struct FitOutcome {
    pub epochs: Vec<EpochMetrics>,
    pub stopped_early: bool,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Self {
            config,
            callbacks: Vec::new(),
        }
    }

    pub fn with_callback(mut self, callback: impl TrainingCallback + 'static) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub(crate) fn fit<B: AutodiffBackend>(
        &mut self,
        mut network: SequenceNetwork<B>,
        network_config: &NetworkConfig,
        x: ArrayView3<'_, bool>,
        y: ArrayView2<'_, bool>,
        device: &B::Device,
    ) -> Result<(SequenceNetwork<B>, FitOutcome)> {
        self.config.validate()?;
        check_shapes(network_config, x, y)?;

        // rho 0.9, epsilon 1e-7
        let mut optim = RmsPropConfig::new()
            .with_alpha(0.9)
            .with_epsilon(1e-7)
            .init::<B, SequenceNetwork<B>>();
        let loss_kind = network_config.loss;

        let samples = x.dim().0;
        let mut order: Vec<usize> = (0..samples).collect();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut epochs = Vec::with_capacity(self.config.epochs);
        let mut stopped_early = false;

        info!(
            "Training on {} phrases, {} epochs, batch size {}, loss {}",
            samples, self.config.epochs, self.config.batch_size, loss_kind
        );

        for epoch in 1..=self.config.epochs {
            if self.config.shuffle {
                order.shuffle(&mut rng);
            }

            let mut loss_sum = 0.0;
            let mut accuracy_sum = 0.0;
            let mut mae_sum = 0.0;

            for (i, rows) in order.chunks(self.config.batch_size).enumerate() {
                let inputs = batch::phrases::<B>(x, rows, device);
                let targets = batch::labels::<B>(y, rows, device);

                let output = network.forward_train(inputs);
                let loss = loss_kind.compute(output.clone(), targets.clone());

                let weight = rows.len() as f64;
                let batch_loss = scalar(loss.clone());
                loss_sum += batch_loss * weight;
                accuracy_sum += binary_accuracy(output.clone().detach(), targets.clone()) * weight;
                mae_sum += scalar((output.detach() - targets).abs().mean()) * weight;
                debug!("epoch {} batch {} loss {:.4}", epoch, i, batch_loss);

                let grads = GradientsParams::from_grads(loss.backward(), &network);
                network = optim.step(self.config.learning_rate, network, grads);
            }

            let n = samples as f64;
            let metrics = EpochMetrics {
                epoch,
                loss: loss_sum / n,
                accuracy: accuracy_sum / n,
                mean_absolute_error: mae_sum / n,
            };
            info!(
                "Epoch {}/{} - loss: {:.4} - accuracy: {:.4} - mae: {:.4}",
                epoch,
                self.config.epochs,
                metrics.loss,
                metrics.accuracy,
                metrics.mean_absolute_error
            );
            epochs.push(metrics);

            let stop = self.callbacks.iter_mut().fold(false, |stop, cb| {
                cb.on_epoch_end(&metrics) == CallbackAction::Stop || stop
            });
            if stop {
                stopped_early = epoch < self.config.epochs;
                break;
            }
        }

        Ok((
            network,
            FitOutcome {
                epochs,
                stopped_early,
            },
        ))
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new(TrainConfig::default())
    }
}

pub(crate) fn check_shapes(
    config: &NetworkConfig,
    x: ArrayView3<'_, bool>,
    y: ArrayView2<'_, bool>,
) -> Result<()> {
    let (samples, lookback, pitches) = x.dim();
    if samples == 0 {
        return Err(Error::Shape("no training phrases".into()));
    }
    if (lookback, pitches) != (config.lookback, config.num_pitches) {
        return Err(Error::Shape(format!(
            "phrases are {lookback}x{pitches}, network expects {}x{}",
            config.lookback, config.num_pitches
        )));
    }
    if y.dim() != (samples, config.num_pitches) {
        return Err(Error::Shape(format!(
            "labels are {:?}, expected ({samples}, {})",
            y.dim(),
            config.num_pitches
        )));
    }
    Ok(())
}

fn scalar<B: Backend>(t: Tensor<B, 1>) -> f64 {
    t.into_scalar().elem::<f64>()
}

fn binary_accuracy<B: Backend>(output: Tensor<B, 2>, target: Tensor<B, 2>) -> f64 {
    let hits = output
        .greater_elem(0.5)
        .equal(target.greater_elem(0.5))
        .float()
        .mean();
    scalar(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend_pool::CpuBackend;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;
    use ndarray::{Array2, Array3};

    fn metrics(epoch: usize, loss: f64) -> EpochMetrics {
        EpochMetrics {
            epoch,
            loss,
            accuracy: 0.0,
            mean_absolute_error: 0.0,
        }
    }

    #[test]
    fn test_early_stopping_patience() {
        let mut stopper = EarlyStopping::new(2).with_min_delta(0.01);
        assert_eq!(stopper.on_epoch_end(&metrics(1, 1.0)), CallbackAction::Continue);
        assert_eq!(stopper.on_epoch_end(&metrics(2, 0.8)), CallbackAction::Continue);
        // improvement smaller than min_delta counts as a miss
        assert_eq!(stopper.on_epoch_end(&metrics(3, 0.795)), CallbackAction::Continue);
        assert_eq!(stopper.on_epoch_end(&metrics(4, 0.9)), CallbackAction::Stop);
    }

    #[test]
    fn test_binary_accuracy() {
        let device = NdArrayDevice::default();
        let output = Tensor::<NdArray<f32>, 2>::from_floats([[0.9, 0.2], [0.6, 0.4]], &device);
        let target = Tensor::<NdArray<f32>, 2>::from_floats([[1.0, 0.0], [0.0, 0.0]], &device);
        approx::assert_relative_eq!(binary_accuracy(output, target), 0.75, epsilon = 1e-6);
    }

    #[test]
    fn test_shape_checks() {
        let config = NetworkConfig::new(4, 6);
        let x = Array3::from_elem((3, 4, 6), false);
        assert!(check_shapes(&config, x.view(), Array2::from_elem((3, 6), false).view()).is_ok());
        assert!(check_shapes(&config, x.view(), Array2::from_elem((2, 6), false).view()).is_err());

        let wide = Array3::from_elem((3, 4, 8), false);
        assert!(matches!(
            check_shapes(&config, wide.view(), Array2::from_elem((3, 8), false).view()),
            Err(Error::Shape(_))
        ));

        let empty = Array3::from_elem((0, 4, 6), false);
        assert!(check_shapes(&config, empty.view(), Array2::from_elem((0, 6), false).view()).is_err());
    }

    #[test]
    fn test_fit_runs_epochs_and_callbacks() {
        let device = NdArrayDevice::default();
        let config = NetworkConfig::new(3, 4);
        let network = config.init::<CpuBackend>(&device).unwrap();
        let x = Array3::from_shape_fn((5, 3, 4), |(s, t, p)| (s + t) % 4 == p);
        let y = Array2::from_shape_fn((5, 4), |(s, p)| (s + 3) % 4 == p);

        let mut trainer = Trainer::new(TrainConfig::default().with_epochs(3).with_batch_size(2))
            .with_callback(EarlyStopping::new(10));
        let (_, outcome) = trainer
            .fit(network, &config, x.view(), y.view(), &device)
            .unwrap();

        assert_eq!(outcome.epochs.len(), 3);
        assert!(!outcome.stopped_early);
        for (i, m) in outcome.epochs.iter().enumerate() {
            assert_eq!(m.epoch, i + 1);
            assert!(m.loss.is_finite() && m.loss > 0.0);
            assert!((0.0..=1.0).contains(&m.accuracy));
            assert!((0.0..=1.0).contains(&m.mean_absolute_error));
        }
    }

    struct StopAfter(usize);

    impl TrainingCallback for StopAfter {
        fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> CallbackAction {
            if metrics.epoch >= self.0 {
                CallbackAction::Stop
            } else {
                CallbackAction::Continue
            }
        }
    }

    #[test]
    fn test_callback_stops_training() {
        let device = NdArrayDevice::default();
        let config = NetworkConfig::new(2, 2);
        let network = config.init::<CpuBackend>(&device).unwrap();
        let x = Array3::from_elem((4, 2, 2), true);
        let y = Array2::from_elem((4, 2), true);

        let mut trainer =
            Trainer::new(TrainConfig::default().with_epochs(5)).with_callback(StopAfter(2));
        let (_, outcome) = trainer
            .fit(network, &config, x.view(), y.view(), &device)
            .unwrap();

        assert_eq!(outcome.epochs.len(), 2);
        assert!(outcome.stopped_early);
    }
}
