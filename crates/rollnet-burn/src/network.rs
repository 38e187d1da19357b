//! Sequence network: a convolutional front end feeding stacked LSTMs.
//!
//! Input is a batch of phrases `[batch, lookback, num_pitches]`, output the
//! per-pitch probability that each pitch is active on the next step,
//! `[batch, num_pitches]`.

use crate::error::{Error, Result};
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig, PaddingConfig1d};
use burn::prelude::*;
use burn::tensor::activation::{relu, sigmoid};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const CONV_FILTERS: usize = 32;
pub const CONV_KERNEL: usize = 8;
pub const LSTM_WIDTHS: [usize; 3] = [256, 512, 256];
pub const DENSE_WIDTH: usize = 256;
pub const DROPOUT: f64 = 0.3;

/// Keeps `log` finite in binary cross-entropy.
const BCE_EPSILON: f64 = 1e-7;

/// Training objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LossKind {
    #[default]
    #[serde(rename = "binary_crossentropy")]
    BinaryCrossentropy,
    #[serde(rename = "mse")]
    MeanSquaredError,
    #[serde(rename = "mae")]
    MeanAbsoluteError,
}

impl LossKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LossKind::BinaryCrossentropy => "binary_crossentropy",
            LossKind::MeanSquaredError => "mse",
            LossKind::MeanAbsoluteError => "mae",
        }
    }

    /// Mean loss over every cell of `output` against `target`.
    pub fn compute<B: Backend>(&self, output: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
        match self {
            LossKind::BinaryCrossentropy => {
                let p = output.clamp(BCE_EPSILON, 1.0 - BCE_EPSILON);
                let positive = target.clone() * p.clone().log();
                let negative = target.neg().add_scalar(1.0) * p.neg().add_scalar(1.0).log();
                (positive + negative).mean().neg()
            }
            LossKind::MeanSquaredError => (output - target).powf_scalar(2.0).mean(),
            LossKind::MeanAbsoluteError => (output - target).abs().mean(),
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LossKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary_crossentropy" | "bce" => Ok(LossKind::BinaryCrossentropy),
            "mse" | "mean_squared_error" => Ok(LossKind::MeanSquaredError),
            "mae" | "mean_absolute_error" => Ok(LossKind::MeanAbsoluteError),
            other => Err(Error::InvalidConfig(format!("unknown loss \"{other}\""))),
        }
    }
}

/// Shape of the network. Stored next to the weights so a saved model can be
/// rebuilt without the caller repeating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub lookback: usize,
    pub num_pitches: usize,
    #[serde(default)]
    pub loss: LossKind,
}

impl NetworkConfig {
    pub fn new(lookback: usize, num_pitches: usize) -> Self {
        Self {
            lookback,
            num_pitches,
            loss: LossKind::default(),
        }
    }

    pub fn with_loss(mut self, loss: LossKind) -> Self {
        self.loss = loss;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookback == 0 {
            return Err(Error::InvalidConfig("lookback must be at least 1".into()));
        }
        if self.num_pitches == 0 {
            return Err(Error::InvalidConfig("num_pitches must be at least 1".into()));
        }
        Ok(())
    }

    /// Fresh, randomly initialized network.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SequenceNetwork<B>> {
        self.validate()?;
        let [lstm1, lstm2, lstm3] = LSTM_WIDTHS;
        Ok(SequenceNetwork {
            conv: Conv1dConfig::new(self.num_pitches, CONV_FILTERS, CONV_KERNEL)
                .with_padding(PaddingConfig1d::Valid)
                .init(device),
            lstm1: LstmConfig::new(CONV_FILTERS, lstm1, true).init(device),
            lstm2: LstmConfig::new(lstm1, lstm2, true).init(device),
            lstm3: LstmConfig::new(lstm2, lstm3, true).init(device),
            dropout: DropoutConfig::new(DROPOUT).init(),
            dense: LinearConfig::new(lstm3, DENSE_WIDTH).init(device),
            output: LinearConfig::new(DENSE_WIDTH, self.num_pitches).init(device),
        })
    }
}

#[derive(Module, Debug)]
pub struct SequenceNetwork<B: Backend> {
    conv: Conv1d<B>,
    lstm1: Lstm<B>,
    lstm2: Lstm<B>,
    lstm3: Lstm<B>,
    dropout: Dropout,
    dense: Linear<B>,
    output: Linear<B>,
}

impl<B: Backend> SequenceNetwork<B> {
    /// Inference pass, dropout disabled.
    pub fn forward(&self, phrases: Tensor<B, 3>) -> Tensor<B, 2> {
        self.run(phrases, false)
    }

    /// Training pass with dropout.
    pub fn forward_train(&self, phrases: Tensor<B, 3>) -> Tensor<B, 2> {
        self.run(phrases, true)
    }

    fn run(&self, phrases: Tensor<B, 3>, training: bool) -> Tensor<B, 2> {
        let [batch, _, pitches] = phrases.dims();
        let device = phrases.device();

        // Zero-pad time so the convolution keeps the phrase length. An even
        // kernel takes one more step of padding after than before.
        let before = (CONV_KERNEL - 1) / 2;
        let after = CONV_KERNEL - 1 - before;
        let x = Tensor::cat(
            vec![
                Tensor::zeros([batch, pitches, before], &device),
                phrases.swap_dims(1, 2),
                Tensor::zeros([batch, pitches, after], &device),
            ],
            2,
        );
        let x = relu(self.conv.forward(x)).swap_dims(1, 2);

        let (x, _) = self.lstm1.forward(x, None);
        let (x, _) = self.lstm2.forward(x, None);
        let (x, _) = self.lstm3.forward(x, None);

        let [_, steps, hidden] = x.dims();
        let x = x
            .slice([0..batch, steps - 1..steps, 0..hidden])
            .reshape([batch, hidden]);

        let x = self.maybe_dropout(x, training);
        let x = relu(self.dense.forward(x));
        let x = self.maybe_dropout(x, training);
        sigmoid(self.output.forward(x))
    }

    fn maybe_dropout(&self, x: Tensor<B, 2>, training: bool) -> Tensor<B, 2> {
        if training {
            self.dropout.forward(x)
        } else {
            x
        }
    }
}
