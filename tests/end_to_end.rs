//! MIDI in, trained model, MIDI out.

use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use ndarray::s;
use rollnet::prelude::*;
use rollnet::roll::ParsedMidiFile;
use rollnet::{Error, ModelArtifact, ModelState};
use std::path::{Path, PathBuf};

const TPB: u16 = 96;

fn note_event(delta: u32, key: u8, on: bool) -> TrackEvent<'static> {
    let message = if on {
        MidiMessage::NoteOn {
            key: key.into(),
            vel: 80.into(),
        }
    } else {
        MidiMessage::NoteOff {
            key: key.into(),
            vel: 0.into(),
        }
    };
    TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Midi {
            channel: 0.into(),
            message,
        },
    }
}

/// A rising scale of quarter notes on a track named "Piano".
fn write_scale(dir: &Path, keys: &[u8]) -> PathBuf {
    let mut track = vec![TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Piano")),
    }];
    for &key in keys {
        track.push(note_event(0, key, true));
        track.push(note_event(TPB as u32, key, false));
    }
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header::new(Format::SingleTrack, Timing::Metrical(TPB.into())),
        tracks: vec![track],
    };
    let path = dir.join("scale.mid");
    smf.save(&path).unwrap();
    path
}

fn small_config() -> RollConfig {
    // 4 steps per beat keeps the roll short
    RollConfig::new(24).with_beat_resolution(4)
}

#[test]
fn test_train_and_generate_from_midi() {
    let dir = tempfile::tempdir().unwrap();
    let midi = write_scale(dir.path(), &[60, 62, 64, 65, 67, 69]);

    let mut corpus = MidiCorpus::new(small_config()).unwrap();
    corpus.load_midi(&[&midi]).unwrap();
    let roll = corpus.roll().unwrap().clone();
    assert_eq!(roll.len(), 6 * 4);
    assert_eq!(roll.width(), 24);

    let mut model =
        SequenceModel::<CpuBackend>::new("scale", dir.path().join("models"), Default::default());
    assert_eq!(model.state(), ModelState::Unbuilt);

    let history = rollnet::train_on_roll(
        &mut model,
        &roll,
        4,
        2,
        TrainConfig::default().with_epochs(2).with_batch_size(4),
    )
    .unwrap();

    assert_eq!(model.state(), ModelState::Built);
    assert_eq!(model.config().unwrap().num_pitches, 24);
    assert_eq!(history.epochs.len(), 2);
    assert!(history.epochs.iter().all(|m| m.loss.is_finite()));
    assert!(ModelArtifact::new(dir.path().join("models"), "scale").exists());

    let seed = roll
        .with_data(roll.data().slice(s![..4, ..]).to_owned())
        .unwrap();
    let continued = rollnet::generate_roll(&model, &seed, 8, 0.5).unwrap();
    assert_eq!(continued.len(), 12);
    assert_eq!(continued.window(), roll.window());
    assert_eq!(continued.data().slice(s![..4, ..]), seed.view());

    let out = dir.path().join("generated/continued.mid");
    rollnet::export::write_midi(&continued, &corpus.config().pitch, &out).unwrap();
    assert_eq!(ParsedMidiFile::load(&out).unwrap().end_tick, 12);
}

#[test]
fn test_reload_trained_model() {
    let dir = tempfile::tempdir().unwrap();
    let midi = write_scale(dir.path(), &[60, 64, 67, 72, 67, 64]);

    let mut corpus = MidiCorpus::new(small_config()).unwrap();
    corpus.load_midi(&[&midi]).unwrap();
    let roll = corpus.take_roll().unwrap();

    let mut model = SequenceModel::<CpuBackend>::new("arp", dir.path(), Default::default());
    let history =
        rollnet::train_on_roll(&mut model, &roll, 3, 3, TrainConfig::default()).unwrap();
    let weights = history.artifact.unwrap();

    let mut reloaded = SequenceModel::<CpuBackend>::new("arp", dir.path(), Default::default());
    reloaded.load(&weights).unwrap();
    assert_eq!(reloaded.config(), model.config());

    let (x, _) = rollnet::vectorize::vectorize(roll.view(), 3, 3).unwrap();
    let a = model.predict(x.view()).unwrap();
    let b = reloaded.predict(x.view()).unwrap();
    for (p, q) in a.iter().zip(b.iter()) {
        approx::assert_relative_eq!(*p, *q, epsilon = 1e-6);
    }
}

#[test]
fn test_errors_cross_crate_boundaries() {
    let corpus_err: Error = MidiCorpus::new(RollConfig::new(59)).err().unwrap().into();
    assert!(matches!(corpus_err, Error::Roll(_)));

    let dir = tempfile::tempdir().unwrap();
    let model = SequenceModel::<CpuBackend>::new("none", dir.path(), Default::default());
    let seed = PianoRoll::full(ndarray::Array2::from_elem((4, 128), false), 120.0, 24);
    assert!(matches!(
        rollnet::generate_roll(&model, &seed, 4, 0.5),
        Err(Error::Model(rollnet::model::Error::NotBuilt))
    ));
}
