//! Pipeline configuration.

use crate::classify::ClassifierConfig;
use crate::error::{Error, Result};
use crate::roll::PitchWindow;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed pitch-axis constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Center of every cut window.
    pub center: u8,
    /// Width of an uncut roll.
    pub midi_range: usize,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            center: 64,
            midi_range: 128,
        }
    }
}

impl PitchConfig {
    /// Symmetric window of `num_pitches` around the center.
    pub fn window(&self, num_pitches: usize) -> Result<PitchWindow> {
        if num_pitches == 0 || num_pitches % 2 != 0 {
            return Err(Error::InvalidConfig(format!(
                "num_pitches {num_pitches} must be even and non-zero"
            )));
        }
        let window = PitchWindow::new(self.center, num_pitches / 2);
        if window.notes_above > self.center as usize || window.upper() > self.midi_range {
            return Err(Error::InvalidConfig(format!(
                "window {}..{} exceeds the MIDI range 0..{}",
                self.center as i64 - window.notes_above as i64,
                window.upper(),
                self.midi_range
            )));
        }
        Ok(window)
    }

    pub fn validate(&self) -> Result<()> {
        if self.midi_range == 0 || self.midi_range > 128 {
            return Err(Error::InvalidConfig(format!(
                "midi_range {} out of range (1-128)",
                self.midi_range
            )));
        }
        if self.center as usize >= self.midi_range {
            return Err(Error::InvalidConfig(format!(
                "center {} outside the MIDI range",
                self.center
            )));
        }
        Ok(())
    }
}

/// Configuration for building rolls from MIDI files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollConfig {
    /// Width of a cut roll.
    pub num_pitches: usize,
    /// Time steps per quarter note. 24 covers both 3/4 and 4/4 subdivisions.
    pub beat_resolution: usize,
    /// Narrow the pitch axis to the window around the center.
    pub cut: bool,
    pub pitch: PitchConfig,
    pub classifier: ClassifierConfig,
}

impl Default for RollConfig {
    fn default() -> Self {
        Self {
            num_pitches: 60,
            beat_resolution: 24,
            cut: true,
            pitch: PitchConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl RollConfig {
    pub fn new(num_pitches: usize) -> Self {
        Self {
            num_pitches,
            ..Default::default()
        }
    }

    pub fn with_beat_resolution(mut self, beat_resolution: usize) -> Self {
        self.beat_resolution = beat_resolution;
        self
    }

    pub fn with_cut(mut self, cut: bool) -> Self {
        self.cut = cut;
        self
    }

    pub fn notes_above(&self) -> usize {
        self.num_pitches / 2
    }

    /// Width of the rolls this configuration produces.
    pub fn output_width(&self) -> usize {
        if self.cut {
            self.num_pitches
        } else {
            self.pitch.midi_range
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.pitch.validate()?;
        // Exported files use the resolution as ticks per beat (15 bits).
        if self.beat_resolution == 0 || self.beat_resolution > 0x7FFF {
            return Err(Error::InvalidConfig(format!(
                "beat_resolution {} out of range (1-32767)",
                self.beat_resolution
            )));
        }
        if self.cut {
            self.pitch.window(self.num_pitches)?;
        }
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_toml(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path.as_ref())?)
    }
}
