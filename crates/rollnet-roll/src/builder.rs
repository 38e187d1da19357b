//! Builds one contiguous piano roll from a batch of MIDI files.

use crate::classify::{TrackAnalysis, TrackClassifier};
use crate::config::RollConfig;
use crate::error::{Error, Result};
use crate::file::{Multitrack, ParsedMidiFile, DEFAULT_TEMPO_BPM};
use crate::roll::{concat_time, CutReport, PianoRoll, PitchWindow};
use ndarray::Array2;
use std::path::Path;
use tracing::{debug, info};

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// Piano tracks were merged into the roll.
    Merged {
        steps: usize,
        cut: Option<CutReport>,
    },
    /// No piano tracks remained after filtering.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub source: String,
    pub analysis: TrackAnalysis,
    pub tempo: f64,
    pub outcome: FileOutcome,
}

/// Per-file outcomes of a batch load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub files: Vec<FileReport>,
}

impl LoadReport {
    pub fn merged(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Merged { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.files.len() - self.merged()
    }
}

pub struct RollBuilder {
    config: RollConfig,
    classifier: TrackClassifier,
    window: Option<PitchWindow>,
}

impl RollBuilder {
    pub fn new(config: RollConfig) -> Result<Self> {
        config.validate()?;
        let window = if config.cut {
            Some(config.pitch.window(config.num_pitches)?)
        } else {
            None
        };
        Ok(Self {
            classifier: TrackClassifier::new(config.classifier.clone()),
            config,
            window,
        })
    }

    pub fn config(&self) -> &RollConfig {
        &self.config
    }

    pub fn classifier(&self) -> &TrackClassifier {
        &self.classifier
    }

    /// Load, filter and merge `paths` in order.
    ///
    /// A file that fails to load or holds an unclassifiable track aborts the batch.
    pub fn build_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<(PianoRoll, LoadReport)> {
        self.log_bounds();
        let mut state = BatchState::default();
        for path in paths {
            let path = path.as_ref();
            info!("Loading {}", path.display());
            let multitrack = ParsedMidiFile::load(path)?.resample(self.config.beat_resolution);
            self.process(path.display().to_string(), multitrack, &mut state)?;
        }
        self.finish(state)
    }

    /// Same as [`build_files`](Self::build_files) for already-quantized tracks.
    ///
    /// Every multitrack must be quantized at the configured beat resolution.
    pub fn build_multitracks(
        &self,
        multitracks: impl IntoIterator<Item = (String, Multitrack)>,
    ) -> Result<(PianoRoll, LoadReport)> {
        self.log_bounds();
        let mut state = BatchState::default();
        for (source, multitrack) in multitracks {
            self.process(source, multitrack, &mut state)?;
        }
        self.finish(state)
    }

    fn log_bounds(&self) {
        if let Some(window) = self.window {
            info!(
                "Pitch window {}..{} ({} pitches)",
                window.lower(),
                window.upper(),
                window.width()
            );
        }
    }

    fn process(
        &self,
        source: String,
        mut multitrack: Multitrack,
        state: &mut BatchState,
    ) -> Result<()> {
        if multitrack.resolution != self.config.beat_resolution {
            return Err(Error::ResolutionMismatch {
                file: source,
                expected: self.config.beat_resolution,
                found: multitrack.resolution,
            });
        }
        state.tempo = multitrack.tempo;

        let analysis = self.classifier.analyze(&multitrack.tracks)?;
        info!("...Track analysis of {:?}", analysis);

        multitrack.tracks.retain(|t| self.classifier.keep_for_roll(t));

        if multitrack.tracks.is_empty() {
            info!("...No piano tracks in {}, skipping", source);
            state.report.files.push(FileReport {
                source,
                analysis,
                tempo: multitrack.tempo,
                outcome: FileOutcome::Skipped,
            });
            return Ok(());
        }

        let roll = PianoRoll::full(
            multitrack.blend_any(self.config.pitch.midi_range),
            multitrack.tempo,
            multitrack.resolution,
        );
        debug!("...Input shape: {:?}", roll.data().dim());

        let (refined, cut) = match self.window {
            Some(window) => {
                let (refined, report) = roll.cut(window)?;
                info!(
                    "...Refined down {} dimensions with {} note loss ({:.2}%)",
                    self.config.pitch.midi_range - window.width(),
                    report.lost_notes,
                    report.lost_percent()
                );
                (refined, Some(report))
            }
            None => (roll, None),
        };
        debug!("...Output shape: {:?}", refined.data().dim());

        state.report.files.push(FileReport {
            source,
            analysis,
            tempo: multitrack.tempo,
            outcome: FileOutcome::Merged {
                steps: refined.len(),
                cut,
            },
        });
        state.rolls.push(refined.into_data());
        Ok(())
    }

    fn finish(&self, state: BatchState) -> Result<(PianoRoll, LoadReport)> {
        let views: Vec<_> = state.rolls.iter().map(|r| r.view()).collect();
        let extended = concat_time(&views, self.config.output_width())?;
        info!("Extended output shape {:?}", extended.dim());

        let roll = match self.window {
            Some(window) => PianoRoll::windowed(
                extended,
                window,
                state.tempo,
                self.config.beat_resolution,
            )?,
            None => PianoRoll::full(extended, state.tempo, self.config.beat_resolution),
        };
        Ok((roll, state.report))
    }
}

struct BatchState {
    rolls: Vec<Array2<bool>>,
    tempo: f64,
    report: LoadReport,
}

impl Default for BatchState {
    fn default() -> Self {
        Self {
            rolls: Vec::new(),
            tempo: DEFAULT_TEMPO_BPM,
            report: LoadReport::default(),
        }
    }
}
