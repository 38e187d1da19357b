//! Piano roll to Standard MIDI File.
//!
//! A roll is written as a single-track (format 0) file with metrical timing of
//! one tick per time step. Every run of active cells in a pitch column becomes
//! one note.

use crate::config::PitchConfig;
use crate::error::{Error, Result};
use crate::roll::PianoRoll;
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use ndarray::ArrayView2;
use std::path::Path;
use tracing::{debug, info};

pub const EXPORT_TRACK_NAME: &str = "Exported Pianoroll";

const EXPORT_VELOCITY: u8 = 100;
const MIDI_PITCHES: usize = 128;

/// Encode `roll` as SMF bytes. Cut rolls are first restored to the full range.
pub fn roll_to_smf(roll: &PianoRoll, pitch: &PitchConfig) -> Result<Vec<u8>> {
    let full = roll.to_full_range(pitch)?;
    debug!("Output dim: {:?}", full.dim());
    encode(full.view(), roll.beat_resolution(), roll.tempo())
}

/// Write `roll` to `path` as a MIDI file.
pub fn write_midi(roll: &PianoRoll, pitch: &PitchConfig, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = roll_to_smf(roll, pitch)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    info!("Saving file \"{}\"", path.display());
    std::fs::write(path, bytes)?;
    Ok(())
}

fn encode(roll: ArrayView2<'_, bool>, beat_resolution: usize, tempo: f64) -> Result<Vec<u8>> {
    if roll.ncols() > MIDI_PITCHES {
        return Err(Error::RollTooWide {
            width: roll.ncols(),
            max: MIDI_PITCHES,
        });
    }
    let ticks_per_beat = u16::try_from(beat_resolution)
        .ok()
        .filter(|&tpb| (1..=0x7FFF).contains(&tpb))
        .ok_or_else(|| {
            Error::InvalidConfig(format!("beat_resolution {beat_resolution} out of range"))
        })?;

    let len = roll.nrows() as u32;
    // (tick, order, event); note-offs sort before note-ons on the same tick
    let mut abs_events: Vec<(u32, u8, TrackEventKind<'static>)> = Vec::new();

    for (pitch, column) in roll.columns().into_iter().enumerate() {
        let key = pitch as u8;
        let mut start = None;
        for (step, &on) in column.iter().enumerate() {
            match (on, start) {
                (true, None) => {
                    abs_events.push((step as u32, 1, note_on(key)));
                    start = Some(step);
                }
                (false, Some(_)) => {
                    abs_events.push((step as u32, 0, note_off(key)));
                    start = None;
                }
                _ => {}
            }
        }
        if start.is_some() {
            abs_events.push((len, 0, note_off(key)));
        }
    }

    abs_events.sort_by_key(|(tick, order, _)| (*tick, *order));

    let mut track = vec![
        TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(EXPORT_TRACK_NAME.as_bytes())),
        },
        TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(tempo_micros(tempo).into())),
        },
        TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::ProgramChange { program: 0.into() },
            },
        },
    ];

    let mut last_tick = 0u32;
    for (tick, _, kind) in abs_events {
        track.push(TrackEvent {
            delta: (tick - last_tick).into(),
            kind,
        });
        last_tick = tick;
    }

    // End of track sits at the roll length so trailing silence survives.
    track.push(TrackEvent {
        delta: len.saturating_sub(last_tick).into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header::new(Format::SingleTrack, Timing::Metrical(ticks_per_beat.into())),
        tracks: vec![track],
    };

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;
    Ok(bytes)
}

fn note_on(key: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: 0.into(),
        message: MidiMessage::NoteOn {
            key: key.into(),
            vel: EXPORT_VELOCITY.into(),
        },
    }
}

fn note_off(key: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: 0.into(),
        message: MidiMessage::NoteOff {
            key: key.into(),
            vel: 0.into(),
        },
    }
}

/// Microseconds per quarter note, clamped to the 24-bit field.
fn tempo_micros(bpm: f64) -> u32 {
    let bpm = if bpm.is_finite() && bpm > 0.0 {
        bpm
    } else {
        crate::file::DEFAULT_TEMPO_BPM
    };
    (60_000_000.0 / bpm).round().clamp(1.0, 16_777_215.0) as u32
}
