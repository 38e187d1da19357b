//! Autoregressive roll generation.

use crate::error::{Error, Result};
use crate::model::SequenceModel;
use burn::tensor::backend::AutodiffBackend;
use ndarray::{Array2, ArrayView2, ArrayView3};
use tracing::info;

/// Extend `seed` by `steps` predicted time steps.
///
/// Each step feeds the last `lookback` rows to the model and appends the
/// prediction, with every pitch at or above `threshold` switched on. The
/// returned roll starts with the seed.
pub fn generate<B: AutodiffBackend>(
    model: &SequenceModel<B>,
    seed: ArrayView2<'_, bool>,
    steps: usize,
    threshold: f32,
) -> Result<Array2<bool>> {
    let config = model.config().ok_or(Error::NotBuilt)?;
    let (seed_len, pitches) = seed.dim();
    if pitches != config.num_pitches {
        return Err(Error::Shape(format!(
            "seed has {pitches} pitches, network expects {}",
            config.num_pitches
        )));
    }
    if seed_len < config.lookback {
        return Err(Error::Shape(format!(
            "seed has {seed_len} steps, needs at least {}",
            config.lookback
        )));
    }
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::InvalidConfig(format!(
            "threshold must be within 0..=1, got {threshold}"
        )));
    }

    let lookback = config.lookback;
    let mut cells: Vec<bool> = seed.iter().copied().collect();
    for _ in 0..steps {
        let rows = cells.len() / pitches;
        let window =
            ArrayView3::from_shape((1, lookback, pitches), &cells[(rows - lookback) * pitches..])?;
        let probs = model.predict(window)?;
        cells.extend(probs.row(0).iter().map(|&p| p >= threshold));
    }

    let generated = Array2::from_shape_vec((seed_len + steps, pitches), cells)?;
    info!(
        "Generated {} steps from a {} step seed ({} active cells)",
        steps,
        seed_len,
        generated.iter().filter(|&&on| on).count()
    );
    Ok(generated)
}
