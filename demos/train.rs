//! # Train
//!
//! Build a roll from MIDI files, train the sequence model on it, then
//! continue the first phrase and write the continuation as MIDI. Trains on the
//! GPU when one is found; pass `--cpu` to stay on the CPU.
//!
//! ```bash
//! cargo run --release --example train -- a.mid b.mid c.mid
//! ```

#![recursion_limit = "256"]

use ndarray::{Array2, Array3};
use rollnet::prelude::*;
use rollnet::{AutodiffBackend, BackendTask, DevicePlacement, EarlyStopping, Trainer};

const LOOKBACK: usize = 96;
const GENERATE_STEPS: usize = 384;

struct TrainJob {
    roll: PianoRoll,
    pitch: PitchConfig,
    phrases: Array3<bool>,
    labels: Array2<bool>,
}

impl BackendTask for TrainJob {
    type Output = rollnet::Result<()>;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Self::Output {
        let mut model = SequenceModel::<B>::new("rollnet", "models", device);
        model.build(NetworkConfig::new(LOOKBACK, self.roll.width()))?;

        let mut trainer = Trainer::new(TrainConfig::default().with_epochs(20))
            .with_callback(EarlyStopping::new(3).with_min_delta(1e-4));
        let history = model.train_with(self.phrases.view(), self.labels.view(), &mut trainer)?;
        if let Some(last) = history.last() {
            println!(
                "{} epochs in {:.2} min, loss {:.4}, accuracy {:.4}",
                history.epochs.len(),
                history.elapsed_minutes(),
                last.loss,
                last.accuracy
            );
        }

        let seed = self
            .roll
            .with_data(self.roll.data().slice(ndarray::s![..LOOKBACK, ..]).to_owned())?;
        let continued = generate_roll(&model, &seed, GENERATE_STEPS, 0.5)?;
        rollnet::export::write_midi(&continued, &self.pitch, "generated/continued.mid")?;
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let (flags, paths): (Vec<String>, Vec<String>) =
        std::env::args().skip(1).partition(|a| a.starts_with("--"));
    if paths.is_empty() {
        return Err("usage: train [--cpu] <file.mid>...".into());
    }

    let mut corpus = MidiCorpus::new(RollConfig::new(60))?;
    let report = corpus.load_midi(&paths)?;
    println!("Merged {} files, skipped {}", report.merged(), report.skipped());
    corpus.augment(4, DEFAULT_V_STEP)?;

    let (phrases, labels) = corpus.vectorize(LOOKBACK, 1)?;
    let job = TrainJob {
        pitch: corpus.config().pitch,
        roll: corpus.take_roll().ok_or("no roll loaded")?,
        phrases,
        labels,
    };

    let (pool, preferred) = if flags.iter().any(|f| f == "--cpu") {
        (BackendPool::cpu_only(), DevicePlacement::Cpu)
    } else {
        (BackendPool::new(), DevicePlacement::Gpu)
    };
    println!("Training on {:?}", pool.effective_placement(preferred));
    pool.run(preferred, job)?;

    Ok(())
}
