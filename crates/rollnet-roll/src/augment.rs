//! Pitch-shift augmentation.

use crate::error::Result;
use crate::roll::concat_time;
use ndarray::{Array2, ArrayView2};

/// Circularly shift every row by `shift` pitches (positive moves up).
///
/// Content pushed past either end of the pitch axis wraps to the other side.
pub fn roll_pitches(roll: ArrayView2<'_, bool>, shift: isize) -> Array2<bool> {
    let pitches = roll.ncols();
    let mut shifted = Array2::from_elem(roll.dim(), false);
    if pitches == 0 {
        return shifted;
    }
    for pitch in 0..pitches {
        let target = (pitch as isize + shift).rem_euclid(pitches as isize) as usize;
        shifted.column_mut(target).assign(&roll.column(pitch));
    }
    shifted
}

/// Number of copies `augment` stacks for `n_augments`; odd counts round down.
pub fn copy_count(n_augments: usize) -> usize {
    (n_augments / 2) * 2 + 1
}

/// Stack the original roll followed by, for `k = 1..=n_augments / 2`, a copy
/// shifted up by `k * v_step` and a copy shifted down by `k * v_step`.
pub fn augment(
    roll: ArrayView2<'_, bool>,
    n_augments: usize,
    v_step: usize,
) -> Result<Array2<bool>> {
    let mut copies = vec![roll.to_owned()];
    for k in 1..=n_augments / 2 {
        let shift = (k * v_step) as isize;
        copies.push(roll_pitches(roll, shift));
        copies.push(roll_pitches(roll, -shift));
    }

    let views: Vec<_> = copies.iter().map(|c| c.view()).collect();
    let augmented = concat_time(&views, roll.ncols())?;

    tracing::info!(
        "Augmented roll {} times with a separation of {}: {:?} -> {:?}",
        n_augments,
        v_step,
        roll.dim(),
        augmented.dim()
    );

    Ok(augmented)
}
