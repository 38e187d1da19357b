//! # Preview
//!
//! Cut a MIDI file to 60 pitches around middle E, add two pitch-shifted
//! copies, and write the result back out.
//!
//! ```bash
//! cargo run --example preview -- song.mid generated/preview.mid
//! ```

use rollnet::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let input = args.next().ok_or("usage: preview <input.mid> [output.mid]")?;
    let output = args
        .next()
        .unwrap_or_else(|| "generated/preview.mid".to_string());

    let corpus = MidiCorpus::preview(&input, &output, RollConfig::new(60))?;
    if let Some(roll) = corpus.roll() {
        println!(
            "Wrote {} steps x {} pitches at {:.1} BPM to {}",
            roll.len(),
            roll.width(),
            roll.tempo(),
            output
        );
    }

    Ok(())
}
