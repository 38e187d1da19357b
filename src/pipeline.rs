//! Glue between piano rolls and the sequence model.

use crate::error::Result;
use rollnet_burn::{
    generate, AutodiffBackend, ModelState, NetworkConfig, SequenceModel, TrainConfig,
    TrainingHistory,
};
use rollnet_roll::{vectorize, PianoRoll};
use tracing::info;

/// Vectorize `roll` and train `model` on it.
///
/// An unbuilt model is first built for `lookback` steps of the roll's width.
pub fn train_on_roll<B: AutodiffBackend>(
    model: &mut SequenceModel<B>,
    roll: &PianoRoll,
    lookback: usize,
    step: usize,
    config: TrainConfig,
) -> Result<TrainingHistory> {
    let (x, y) = vectorize::vectorize(roll.view(), lookback, step)?;
    info!("Vectorized {:?} roll into {} phrases", roll.data().dim(), x.dim().0);

    if model.state() == ModelState::Unbuilt {
        model.build(NetworkConfig::new(lookback, roll.width()))?;
    }
    Ok(model.train(x.view(), y.view(), config)?)
}

/// Continue `seed` for `steps` time steps, keeping its tempo, resolution and
/// pitch window so the result can be written straight to MIDI.
pub fn generate_roll<B: AutodiffBackend>(
    model: &SequenceModel<B>,
    seed: &PianoRoll,
    steps: usize,
    threshold: f32,
) -> Result<PianoRoll> {
    let generated = generate(model, seed.view(), steps, threshold)?;
    Ok(seed.with_data(generated)?)
}
