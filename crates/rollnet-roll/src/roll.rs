//! Boolean piano rolls and pitch windows.

use crate::config::PitchConfig;
use crate::error::{Error, Result};
use ndarray::{s, Array2, ArrayView2};
use std::ops::Range;

/// Symmetric slice of the pitch axis: `center - notes_above .. center + notes_above`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchWindow {
    pub center: u8,
    pub notes_above: usize,
}

impl PitchWindow {
    pub fn new(center: u8, notes_above: usize) -> Self {
        Self {
            center,
            notes_above,
        }
    }

    pub fn lower(&self) -> usize {
        (self.center as usize).saturating_sub(self.notes_above)
    }

    /// Exclusive upper bound.
    pub fn upper(&self) -> usize {
        self.center as usize + self.notes_above
    }

    pub fn width(&self) -> usize {
        self.notes_above * 2
    }

    pub fn range(&self) -> Range<usize> {
        self.lower()..self.upper()
    }
}

/// Notes dropped by cutting a roll down to a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutReport {
    /// Active cells before the cut.
    pub total_notes: usize,
    /// Active cells outside the window.
    pub lost_notes: usize,
}

impl CutReport {
    pub fn lost_percent(&self) -> f64 {
        if self.total_notes == 0 {
            0.0
        } else {
            self.lost_notes as f64 / self.total_notes as f64 * 100.0
        }
    }
}

/// Time-by-pitch boolean matrix plus the context needed to export it.
#[derive(Debug, Clone, PartialEq)]
pub struct PianoRoll {
    data: Array2<bool>,
    tempo: f64,
    beat_resolution: usize,
    /// Set when the pitch axis covers only a window of the MIDI range.
    window: Option<PitchWindow>,
}

impl PianoRoll {
    /// Roll spanning the full MIDI range.
    pub fn full(data: Array2<bool>, tempo: f64, beat_resolution: usize) -> Self {
        Self {
            data,
            tempo,
            beat_resolution,
            window: None,
        }
    }

    /// Roll whose pitch axis is `window`.
    pub fn windowed(
        data: Array2<bool>,
        window: PitchWindow,
        tempo: f64,
        beat_resolution: usize,
    ) -> Result<Self> {
        if data.ncols() != window.width() {
            return Err(Error::WidthMismatch {
                expected: window.width(),
                found: data.ncols(),
            });
        }
        Ok(Self {
            data,
            tempo,
            beat_resolution,
            window: Some(window),
        })
    }

    pub fn data(&self) -> &Array2<bool> {
        &self.data
    }

    pub fn view(&self) -> ArrayView2<'_, bool> {
        self.data.view()
    }

    pub fn into_data(self) -> Array2<bool> {
        self.data
    }

    /// Number of time steps.
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// Number of pitches.
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn beat_resolution(&self) -> usize {
        self.beat_resolution
    }

    pub fn window(&self) -> Option<PitchWindow> {
        self.window
    }

    pub fn is_cut(&self) -> bool {
        self.window.is_some()
    }

    pub fn active_cells(&self) -> usize {
        count_active(self.data.view())
    }

    /// Replace the cells, keeping tempo, resolution and window.
    pub fn with_data(&self, data: Array2<bool>) -> Result<Self> {
        if data.ncols() != self.width() {
            return Err(Error::WidthMismatch {
                expected: self.width(),
                found: data.ncols(),
            });
        }
        Ok(Self {
            data,
            ..self.clone()
        })
    }

    /// Slice a full-range roll down to `window`.
    pub fn cut(&self, window: PitchWindow) -> Result<(PianoRoll, CutReport)> {
        if self.is_cut() {
            return Err(Error::InvalidRoll("roll is already cut".into()));
        }
        if window.upper() > self.width() {
            return Err(Error::InvalidRoll(format!(
                "window {}..{} exceeds roll width {}",
                window.lower(),
                window.upper(),
                self.width()
            )));
        }

        let refined = self.data.slice(s![.., window.range()]).to_owned();
        let total_notes = self.active_cells();
        let lost_notes = total_notes - count_active(refined.view());

        let roll = PianoRoll::windowed(refined, window, self.tempo, self.beat_resolution)?;
        Ok((
            roll,
            CutReport {
                total_notes,
                lost_notes,
            },
        ))
    }

    /// Full-range copy with zeros outside the window.
    pub fn to_full_range(&self, pitch: &PitchConfig) -> Result<Array2<bool>> {
        match self.window {
            None => Ok(self.data.clone()),
            Some(window) => {
                if window.upper() > pitch.midi_range {
                    return Err(Error::RollTooWide {
                        width: window.upper(),
                        max: pitch.midi_range,
                    });
                }
                let mut export = Array2::from_elem((self.len(), pitch.midi_range), false);
                export
                    .slice_mut(s![.., window.range()])
                    .assign(&self.data);
                Ok(export)
            }
        }
    }
}

impl std::ops::Index<[usize; 2]> for PianoRoll {
    type Output = bool;

    fn index(&self, index: [usize; 2]) -> &bool {
        &self.data[index]
    }
}

pub(crate) fn count_active(data: ArrayView2<'_, bool>) -> usize {
    data.iter().filter(|&&on| on).count()
}

/// Stack rolls of equal width along the time axis.
pub fn concat_time(parts: &[ArrayView2<'_, bool>], width: usize) -> Result<Array2<bool>> {
    if let Some(bad) = parts.iter().find(|p| p.ncols() != width) {
        return Err(Error::WidthMismatch {
            expected: width,
            found: bad.ncols(),
        });
    }

    let length = parts.iter().map(|p| p.nrows()).sum();
    let mut extended = Array2::from_elem((length, width), false);
    let mut index = 0;
    for part in parts {
        extended
            .slice_mut(s![index..index + part.nrows(), ..])
            .assign(part);
        index += part.nrows();
    }
    Ok(extended)
}
