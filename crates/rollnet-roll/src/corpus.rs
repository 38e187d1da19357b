//! Stateful holder for the roll being prepared for training.

use crate::builder::{LoadReport, RollBuilder};
use crate::config::RollConfig;
use crate::error::{Error, Result};
use crate::roll::PianoRoll;
use crate::{augment, export, vectorize};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use std::path::Path;
use tracing::{info, warn};

/// Default vertical separation between augmented copies.
pub const DEFAULT_V_STEP: usize = 5;

/// One or more MIDI files merged into a single roll, plus the operations that
/// turn it into training data or back into MIDI.
pub struct MidiCorpus {
    builder: RollBuilder,
    roll: Option<PianoRoll>,
}

impl MidiCorpus {
    pub fn new(config: RollConfig) -> Result<Self> {
        Ok(Self {
            builder: RollBuilder::new(config)?,
            roll: None,
        })
    }

    pub fn config(&self) -> &RollConfig {
        self.builder.config()
    }

    pub fn roll(&self) -> Option<&PianoRoll> {
        self.roll.as_ref()
    }

    pub fn take_roll(&mut self) -> Option<PianoRoll> {
        self.roll.take()
    }

    /// Mean tempo of the last loaded file.
    pub fn tempo(&self) -> Option<f64> {
        self.roll.as_ref().map(|r| r.tempo())
    }

    /// Load and merge `paths`, replacing any current roll.
    pub fn load_midi<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<LoadReport> {
        let (roll, report) = self.builder.build_files(paths)?;
        self.roll = Some(roll);
        Ok(report)
    }

    /// Adopt an existing roll array.
    ///
    /// Accepts `(time, pitch)` or `(1, time, pitch)`. A width equal to the MIDI
    /// range is taken as uncut; a narrower even width as a window around the
    /// center; wider rolls are rejected.
    pub fn load_array(&mut self, roll: ArrayView3<'_, bool>, tempo: f64) -> Result<()> {
        if roll.len_of(Axis(0)) != 1 {
            return Err(Error::InvalidRoll(format!(
                "expected a single roll, got a batch of {}",
                roll.len_of(Axis(0))
            )));
        }
        self.load_array2(roll.index_axis(Axis(0), 0), tempo)
    }

    pub fn load_array2(&mut self, roll: ArrayView2<'_, bool>, tempo: f64) -> Result<()> {
        let pitch = self.config().pitch;
        let width = roll.ncols();
        let resolution = self.config().beat_resolution;

        let loaded = if width > pitch.midi_range {
            return Err(Error::RollTooWide {
                width,
                max: pitch.midi_range,
            });
        } else if width == pitch.midi_range {
            info!("Loaded full-width roll");
            PianoRoll::full(roll.to_owned(), tempo, resolution)
        } else {
            let window = pitch.window(width).map_err(|_| {
                Error::InvalidRoll(format!(
                    "width {width} is not an even window around pitch {}",
                    pitch.center
                ))
            })?;
            info!("Roll is cut down to only {} notes", width);
            PianoRoll::windowed(roll.to_owned(), window, tempo, resolution)?
        };

        self.roll = Some(loaded);
        Ok(())
    }

    /// Phrases and labels for training. See [`vectorize::vectorize`].
    pub fn vectorize(
        &self,
        lookback: usize,
        step: usize,
    ) -> Result<(Array3<bool>, Array2<bool>)> {
        let roll = self.roll.as_ref().ok_or(Error::NoRoll)?;
        vectorize::vectorize(roll.view(), lookback, step)
    }

    /// Replace the roll with its pitch-shifted augmentation.
    ///
    /// Without a loaded roll this logs and returns [`Error::NoRoll`], leaving
    /// the corpus unchanged.
    pub fn augment(&mut self, n_augments: usize, v_step: usize) -> Result<()> {
        let Some(roll) = self.roll.as_ref() else {
            warn!("No roll to augment");
            return Err(Error::NoRoll);
        };
        let augmented = augment::augment(roll.view(), n_augments, v_step)?;
        self.roll = Some(roll.with_data(augmented)?);
        Ok(())
    }

    /// Full-range copy of the roll, zero outside the cut window.
    pub fn reformat(&self) -> Result<Array2<bool>> {
        let roll = self.roll.as_ref().ok_or(Error::NoRoll)?;
        roll.to_full_range(&self.config().pitch)
    }

    /// Write the roll as a MIDI file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let roll = self.roll.as_ref().ok_or(Error::NoRoll)?;
        export::write_midi(roll, &self.config().pitch, path)
    }

    /// Load `midi_path` with cutting enabled, augment it twice and write the
    /// result to `out_path`.
    pub fn preview(
        midi_path: impl AsRef<Path>,
        out_path: impl AsRef<Path>,
        config: RollConfig,
    ) -> Result<Self> {
        let mut corpus = Self::new(config.with_cut(true))?;
        info!(
            "Extracting \"{}\" with beat resolution of {}",
            midi_path.as_ref().display(),
            corpus.config().beat_resolution
        );
        corpus.load_midi(&[midi_path.as_ref()])?;
        corpus.augment(2, DEFAULT_V_STEP)?;
        corpus.save(out_path)?;
        Ok(corpus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_augment_without_roll() {
        let mut corpus = MidiCorpus::new(RollConfig::default()).unwrap();
        assert!(matches!(corpus.augment(2, 5), Err(Error::NoRoll)));
        assert!(corpus.roll().is_none());
    }

    #[test]
    fn test_load_array_widths() {
        let mut corpus = MidiCorpus::new(RollConfig::default()).unwrap();

        corpus
            .load_array2(Array2::from_elem((4, 128), false).view(), 90.0)
            .unwrap();
        assert!(!corpus.roll().unwrap().is_cut());
        assert_eq!(corpus.tempo(), Some(90.0));

        corpus
            .load_array2(Array2::from_elem((4, 48), false).view(), 120.0)
            .unwrap();
        let window = corpus.roll().unwrap().window().unwrap();
        assert_eq!(window.range(), 40..88);

        assert!(matches!(
            corpus.load_array2(Array2::from_elem((4, 130), false).view(), 120.0),
            Err(Error::RollTooWide { width: 130, .. })
        ));
        assert!(corpus
            .load_array2(Array2::from_elem((4, 47), false).view(), 120.0)
            .is_err());
    }

    #[test]
    fn test_load_array_squeezes_batch() {
        let mut corpus = MidiCorpus::new(RollConfig::default()).unwrap();
        corpus
            .load_array(Array3::from_elem((1, 6, 60), true).view(), 120.0)
            .unwrap();
        assert_eq!(corpus.roll().unwrap().len(), 6);

        assert!(corpus
            .load_array(Array3::from_elem((2, 6, 60), true).view(), 120.0)
            .is_err());
    }

    #[test]
    fn test_augment_then_vectorize() {
        let mut corpus = MidiCorpus::new(RollConfig::default()).unwrap();
        let roll = Array2::from_shape_fn((10, 60), |(t, p)| t == p);
        corpus.load_array2(roll.view(), 120.0).unwrap();

        corpus.augment(4, 5).unwrap();
        assert_eq!(corpus.roll().unwrap().len(), 50);
        assert_eq!(corpus.roll().unwrap().width(), 60);

        let (x, y) = corpus.vectorize(8, 2).unwrap();
        assert_eq!(x.dim(), (21, 8, 60));
        assert_eq!(y.dim(), (21, 60));
    }

    #[test]
    fn test_reformat_zero_fills() {
        let mut corpus = MidiCorpus::new(RollConfig::default()).unwrap();
        corpus
            .load_array2(Array2::from_elem((3, 60), true).view(), 120.0)
            .unwrap();
        let full = corpus.reformat().unwrap();

        assert_eq!(full.dim(), (3, 128));
        assert_eq!(full.iter().filter(|&&on| on).count(), 3 * 60);
        assert!(!full[[0, 33]] && full[[0, 34]] && full[[0, 93]] && !full[[0, 94]]);
    }
}
