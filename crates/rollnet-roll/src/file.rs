//! MIDI File I/O
//!
//! Parses Standard MIDI Files (SMF) with the `midly` crate into per-instrument
//! tracks carrying name, program, drum flag and note spans. A [`ParsedMidiFile`]
//! keeps raw tick positions; [`ParsedMidiFile::resample`] quantizes it to a
//! fixed number of time steps per quarter note.

use crate::error::{Error, Result};
use midly::{MetaMessage, MidiMessage, Smf, Timing, Track, TrackEventKind};
use ndarray::Array2;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use tracing::debug;

/// Tempo assumed before the first tempo event, as the SMF standard specifies.
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;

/// General MIDI percussion channel (channel 10, zero-based 9).
const DRUM_CHANNEL: u8 = 9;

/// A sounding note. `start` is inclusive, `end` exclusive; both are in the
/// time unit of the container (ticks in [`ParsedMidiFile`], steps in [`Multitrack`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteSpan {
    pub pitch: u8,
    pub velocity: u8,
    pub start: u64,
    pub end: u64,
}

/// One instrument part of a MIDI file.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiTrack {
    pub name: String,
    /// General MIDI program number (0-127).
    pub program: u8,
    pub is_drum: bool,
    pub notes: Vec<NoteSpan>,
}

impl MidiTrack {
    pub fn new(name: impl Into<String>, program: u8, is_drum: bool) -> Self {
        Self {
            name: name.into(),
            program,
            is_drum,
            notes: Vec::new(),
        }
    }

    pub fn with_notes(mut self, notes: Vec<NoteSpan>) -> Self {
        self.notes = notes;
        self
    }
}

/// A tempo change at an absolute tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoChange {
    pub tick: u64,
    pub bpm: f64,
}

/// A parsed MIDI file with tick-based timing.
#[derive(Debug, Clone)]
pub struct ParsedMidiFile {
    /// Instrument parts that contain at least one note.
    pub tracks: Vec<MidiTrack>,

    /// Ticks per quarter note
    pub ticks_per_beat: u16,

    pub tempo_changes: Vec<TempoChange>,

    /// Tick of the last event in any track.
    pub end_tick: u64,
}

/// Tracks quantized to a common time grid. All tracks share `length` steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Multitrack {
    pub tracks: Vec<MidiTrack>,
    /// Time steps per quarter note.
    pub resolution: usize,
    pub length: usize,
    /// Mean tempo in BPM.
    pub tempo: f64,
}

impl ParsedMidiFile {
    /// Load and parse a MIDI file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::parse(&data)
    }

    /// Parse MIDI file from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let smf = Smf::parse(data)?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(tpb) => tpb.as_int(),
            Timing::Timecode(_, _) => {
                return Err(Error::MidiUnsupportedTiming);
            }
        };
        if ticks_per_beat == 0 {
            return Err(Error::MidiFileParse("zero ticks per beat".into()));
        }

        debug!(
            "Parsing MIDI file: {} tracks, {} ticks per beat",
            smf.tracks.len(),
            ticks_per_beat
        );

        let mut tracks = Vec::new();
        let mut tempo_changes = Vec::new();
        let mut end_tick = 0u64;

        for track in smf.tracks.iter() {
            let parsed = Self::parse_track(track);
            tracks.extend(parsed.parts);
            tempo_changes.extend(parsed.tempo_changes);
            end_tick = end_tick.max(parsed.end_tick);
        }

        tempo_changes.sort_by_key(|t| t.tick);

        debug!(
            "Parsed {} instrument tracks, {} tempo changes, {} ticks",
            tracks.len(),
            tempo_changes.len(),
            end_tick
        );

        Ok(Self {
            tracks,
            ticks_per_beat,
            tempo_changes,
            end_tick,
        })
    }

    /// Split a single SMF track into instrument parts keyed by (channel, program).
    fn parse_track(track: &Track) -> ParsedTrack {
        let mut name = String::new();
        let mut tempo_changes = Vec::new();
        let mut programs = [0u8; 16];
        let mut parts: Vec<(u8, u8, MidiTrack)> = Vec::new();
        let mut open: HashMap<(u8, u8), VecDeque<(u64, u8, usize)>> = HashMap::new();
        let mut current_tick = 0u64;

        for event in track.iter() {
            current_tick += event.delta.as_int() as u64;

            match &event.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                    name = String::from_utf8_lossy(bytes).into_owned();
                }
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    // Tempo is in microseconds per quarter note
                    let us_per_qn = tempo.as_int().max(1);
                    tempo_changes.push(TempoChange {
                        tick: current_tick,
                        bpm: 60_000_000.0 / us_per_qn as f64,
                    });
                }
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    match message {
                        MidiMessage::ProgramChange { program } => {
                            programs[channel as usize] = program.as_int();
                        }
                        // velocity 0 is a note off
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            let program = programs[channel as usize];
                            let part = match parts
                                .iter()
                                .position(|(c, p, _)| *c == channel && *p == program)
                            {
                                Some(idx) => idx,
                                None => {
                                    parts.push((
                                        channel,
                                        program,
                                        MidiTrack::new(
                                            String::new(),
                                            program,
                                            channel == DRUM_CHANNEL,
                                        ),
                                    ));
                                    parts.len() - 1
                                }
                            };
                            open.entry((channel, key.as_int())).or_default().push_back((
                                current_tick,
                                vel.as_int(),
                                part,
                            ));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            let pitch = key.as_int();
                            if let Some((start, velocity, part)) = open
                                .get_mut(&(channel, pitch))
                                .and_then(|queue| queue.pop_front())
                            {
                                parts[part].2.notes.push(NoteSpan {
                                    pitch,
                                    velocity,
                                    start,
                                    end: current_tick,
                                });
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        let parts = parts
            .into_iter()
            .map(|(_, _, mut part)| {
                part.name = name.clone();
                part.notes.sort_by_key(|n| (n.start, n.pitch));
                part
            })
            .filter(|part| !part.notes.is_empty())
            .collect();

        ParsedTrack {
            parts,
            tempo_changes,
            end_tick: current_tick,
        }
    }

    /// Tick-weighted mean tempo over the whole file.
    pub fn mean_tempo(&self) -> f64 {
        if self.end_tick == 0 {
            return self
                .tempo_changes
                .last()
                .map(|t| t.bpm)
                .unwrap_or(DEFAULT_TEMPO_BPM);
        }

        let mut current = DEFAULT_TEMPO_BPM;
        let mut last_tick = 0u64;
        let mut weighted = 0.0;
        for change in &self.tempo_changes {
            let tick = change.tick.min(self.end_tick);
            weighted += current * (tick - last_tick) as f64;
            last_tick = tick;
            current = change.bpm;
        }
        weighted += current * (self.end_tick - last_tick) as f64;
        weighted / self.end_tick as f64
    }

    /// Quantize all tracks to `resolution` steps per quarter note.
    ///
    /// Notes shorter than one step still occupy one step.
    pub fn resample(&self, resolution: usize) -> Multitrack {
        let tpb = self.ticks_per_beat as u64;
        let res = resolution as u64;
        let to_step = |tick: u64| (tick * res + tpb / 2) / tpb;

        let mut length = to_step(self.end_tick);
        let tracks = self
            .tracks
            .iter()
            .map(|track| {
                let notes = track
                    .notes
                    .iter()
                    .map(|note| {
                        let start = to_step(note.start);
                        let end = to_step(note.end).max(start + 1);
                        length = length.max(end);
                        NoteSpan {
                            start,
                            end,
                            ..*note
                        }
                    })
                    .collect();
                MidiTrack {
                    notes,
                    ..track.clone()
                }
            })
            .collect();

        Multitrack {
            tracks,
            resolution,
            length: length as usize,
            tempo: self.mean_tempo(),
        }
    }
}

struct ParsedTrack {
    parts: Vec<MidiTrack>,
    tempo_changes: Vec<TempoChange>,
    end_tick: u64,
}

impl Multitrack {
    /// Binarize every track and merge them with a logical OR per cell.
    ///
    /// Pitches at or above `num_pitches` are ignored.
    pub fn blend_any(&self, num_pitches: usize) -> Array2<bool> {
        let mut roll = Array2::from_elem((self.length, num_pitches), false);
        for note in self.tracks.iter().flat_map(|t| t.notes.iter()) {
            let pitch = note.pitch as usize;
            if note.velocity == 0 || pitch >= num_pitches {
                continue;
            }
            let end = (note.end as usize).min(self.length);
            for step in (note.start as usize)..end {
                roll[[step, pitch]] = true;
            }
        }
        roll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{Format, Header, TrackEvent};

    fn note_events(channel: u8, notes: &[(u32, u32, u8)]) -> Vec<(u32, TrackEventKind<'static>)> {
        let mut events = Vec::new();
        for &(start, end, key) in notes {
            events.push((
                start,
                TrackEventKind::Midi {
                    channel: channel.into(),
                    message: MidiMessage::NoteOn {
                        key: key.into(),
                        vel: 90.into(),
                    },
                },
            ));
            events.push((
                end,
                TrackEventKind::Midi {
                    channel: channel.into(),
                    message: MidiMessage::NoteOff {
                        key: key.into(),
                        vel: 0.into(),
                    },
                },
            ));
        }
        events
    }

    fn to_track(mut events: Vec<(u32, TrackEventKind<'static>)>) -> Vec<TrackEvent<'static>> {
        events.sort_by_key(|(tick, _)| *tick);
        let mut last = 0;
        let mut track: Vec<TrackEvent> = events
            .into_iter()
            .map(|(tick, kind)| {
                let delta = tick - last;
                last = tick;
                TrackEvent {
                    delta: delta.into(),
                    kind,
                }
            })
            .collect();
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        track
    }

    fn encode(tracks: Vec<Vec<TrackEvent<'static>>>, tpb: u16) -> Vec<u8> {
        let smf = Smf {
            header: Header::new(Format::Parallel, Timing::Metrical(tpb.into())),
            tracks,
        };
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_parse_empty_midi() {
        // Minimal valid MIDI file (header only)
        let data = [
            // MThd
            0x4D, 0x54, 0x68, 0x64, // Header length (6)
            0x00, 0x00, 0x00, 0x06, // Format 0
            0x00, 0x00, // 1 track
            0x00, 0x01, // 480 ticks per beat
            0x01, 0xE0, // MTrk
            0x4D, 0x54, 0x72, 0x6B, // Track length (4)
            0x00, 0x00, 0x00, 0x04, // End of track
            0x00, 0xFF, 0x2F, 0x00,
        ];

        let file = ParsedMidiFile::parse(&data).unwrap();
        assert_eq!(file.ticks_per_beat, 480);
        assert!(file.tracks.is_empty());
        assert_eq!(file.mean_tempo(), DEFAULT_TEMPO_BPM);
    }

    #[test]
    fn test_timecode_rejected() {
        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Timecode(midly::Fps::Fps25, 40)),
            tracks: vec![to_track(vec![])],
        };
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();

        assert!(matches!(
            ParsedMidiFile::parse(&bytes),
            Err(Error::MidiUnsupportedTiming)
        ));
    }

    #[test]
    fn test_track_metadata() {
        // name and program precede the notes on tick 0
        let mut piano = vec![
            (0, TrackEventKind::Meta(MetaMessage::TrackName(b"Grand Piano"))),
            (
                0,
                TrackEventKind::Midi {
                    channel: 0.into(),
                    message: MidiMessage::ProgramChange { program: 1.into() },
                },
            ),
        ];
        piano.extend(note_events(0, &[(0, 480, 60), (480, 960, 64)]));
        let drums = note_events(DRUM_CHANNEL, &[(0, 120, 36)]);

        let bytes = encode(vec![to_track(piano), to_track(drums)], 480);
        let file = ParsedMidiFile::parse(&bytes).unwrap();

        assert_eq!(file.tracks.len(), 2);
        assert_eq!(file.tracks[0].name, "Grand Piano");
        assert_eq!(file.tracks[0].program, 1);
        assert!(!file.tracks[0].is_drum);
        let pitches: Vec<_> = file.tracks[0].notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 64]);
        assert!(file.tracks[1].is_drum);
        assert_eq!(file.end_tick, 960);
    }

    #[test]
    fn test_note_on_velocity_zero_closes_note() {
        let events = vec![
            (
                0,
                TrackEventKind::Midi {
                    channel: 0.into(),
                    message: MidiMessage::NoteOn {
                        key: 60.into(),
                        vel: 100.into(),
                    },
                },
            ),
            (
                240,
                TrackEventKind::Midi {
                    channel: 0.into(),
                    message: MidiMessage::NoteOn {
                        key: 60.into(),
                        vel: 0.into(),
                    },
                },
            ),
        ];
        let file = ParsedMidiFile::parse(&encode(vec![to_track(events)], 480)).unwrap();
        let note = file.tracks[0].notes[0];
        assert_eq!((note.start, note.end, note.velocity), (0, 240, 100));
    }

    #[test]
    fn test_conductor_track_without_notes_is_dropped() {
        let conductor = to_track(vec![(
            0,
            TrackEventKind::Meta(MetaMessage::Tempo(500_000.into())),
        )]);
        let piano = to_track(note_events(0, &[(0, 480, 60)]));
        let file = ParsedMidiFile::parse(&encode(vec![conductor, piano], 480)).unwrap();

        assert_eq!(file.tracks.len(), 1);
        assert_eq!(file.tempo_changes.len(), 1);
    }

    #[test]
    fn test_mean_tempo_is_tick_weighted() {
        let file = ParsedMidiFile {
            tracks: vec![],
            ticks_per_beat: 480,
            tempo_changes: vec![
                TempoChange { tick: 0, bpm: 100.0 },
                TempoChange {
                    tick: 300,
                    bpm: 200.0,
                },
            ],
            end_tick: 400,
        };
        // 300 ticks at 100 + 100 ticks at 200
        approx::assert_relative_eq!(file.mean_tempo(), 125.0);
    }

    #[test]
    fn test_resample_and_blend() {
        let file = ParsedMidiFile {
            tracks: vec![
                MidiTrack::new("a", 0, false).with_notes(vec![NoteSpan {
                    pitch: 60,
                    velocity: 80,
                    start: 0,
                    end: 480,
                }]),
                MidiTrack::new("b", 0, false).with_notes(vec![
                    NoteSpan {
                        pitch: 60,
                        velocity: 80,
                        start: 240,
                        end: 960,
                    },
                    // shorter than a step
                    NoteSpan {
                        pitch: 72,
                        velocity: 80,
                        start: 960,
                        end: 961,
                    },
                ]),
            ],
            ticks_per_beat: 480,
            tempo_changes: vec![],
            end_tick: 961,
        };

        let multitrack = file.resample(4);
        assert_eq!(multitrack.length, 9);
        assert_eq!(multitrack.tracks[1].notes[1].end, 9);

        let roll = multitrack.blend_any(128);
        assert_eq!(roll.dim(), (9, 128));
        assert_eq!(roll.column(60).iter().filter(|&&on| on).count(), 8);
        assert!(roll[[8, 72]]);
        assert_eq!(roll.iter().filter(|&&on| on).count(), 9);
    }
}
