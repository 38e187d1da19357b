//! Sliding-window (phrase, next step) pairs.

use crate::error::{Error, Result};
use ndarray::{s, Array2, Array3, ArrayView2};

/// Number of windows `vectorize` produces: `ceil((len - lookback) / step)`.
pub fn phrase_count(len: usize, lookback: usize, step: usize) -> usize {
    if step == 0 {
        return 0;
    }
    len.saturating_sub(lookback).div_ceil(step)
}

/// Cut `roll` into overlapping phrases of `lookback` steps, each labelled with
/// the step that follows it.
///
/// Returns `(phrases, labels)` shaped `(count, lookback, pitches)` and
/// `(count, pitches)`. Windows start at `0, step, 2 * step, ..` while
/// `start < len - lookback`.
pub fn vectorize(
    roll: ArrayView2<'_, bool>,
    lookback: usize,
    step: usize,
) -> Result<(Array3<bool>, Array2<bool>)> {
    if lookback == 0 || step == 0 {
        return Err(Error::InvalidConfig(format!(
            "lookback ({lookback}) and step ({step}) must be non-zero"
        )));
    }

    let (len, pitches) = roll.dim();
    let count = phrase_count(len, lookback, step);

    let mut phrases = Array3::from_elem((count, lookback, pitches), false);
    let mut labels = Array2::from_elem((count, pitches), false);

    for (n, start) in (0..len.saturating_sub(lookback)).step_by(step).enumerate() {
        phrases
            .slice_mut(s![n, .., ..])
            .assign(&roll.slice(s![start..start + lookback, ..]));
        labels.row_mut(n).assign(&roll.row(start + lookback));
    }

    tracing::debug!("{} individual phrases", count);

    Ok((phrases, labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Roll whose row `t` has exactly pitch `t % pitches` active.
    fn diagonal(len: usize, pitches: usize) -> Array2<bool> {
        Array2::from_shape_fn((len, pitches), |(t, p)| t % pitches == p)
    }

    #[test]
    fn test_phrase_count() {
        assert_eq!(phrase_count(10, 3, 1), 7);
        assert_eq!(phrase_count(10, 3, 2), 4);
        assert_eq!(phrase_count(10, 3, 7), 1);
        assert_eq!(phrase_count(3, 3, 1), 0);
        assert_eq!(phrase_count(2, 3, 1), 0);
    }

    #[test]
    fn test_shapes_and_alignment() {
        let roll = diagonal(12, 5);
        let (x, y) = vectorize(roll.view(), 4, 3).unwrap();

        assert_eq!(x.dim(), (3, 4, 5));
        assert_eq!(y.dim(), (3, 5));

        for (n, start) in [0usize, 3, 6].into_iter().enumerate() {
            assert_eq!(x.slice(s![n, .., ..]), roll.slice(s![start..start + 4, ..]));
            assert_eq!(y.row(n), roll.row(start + 4));
        }
    }

    #[test]
    fn test_label_is_row_after_phrase() {
        let roll = diagonal(9, 4);
        let (x, y) = vectorize(roll.view(), 3, 1).unwrap();
        // The next phrase's last row is the current label.
        for n in 0..x.dim().0 - 1 {
            assert_eq!(x.slice(s![n + 1, 2, ..]), y.row(n));
        }
    }

    #[test]
    fn test_short_roll_yields_nothing() {
        let roll = diagonal(3, 4);
        let (x, y) = vectorize(roll.view(), 3, 1).unwrap();
        assert_eq!(x.dim(), (0, 3, 4));
        assert_eq!(y.dim(), (0, 4));
    }

    #[test]
    fn test_zero_step_rejected() {
        let roll = diagonal(5, 2);
        assert!(vectorize(roll.view(), 2, 0).is_err());
        assert!(vectorize(roll.view(), 0, 1).is_err());
    }
}
