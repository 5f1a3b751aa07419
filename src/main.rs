//! Binary entry point: parses options, sets up logging, scans MIDI and opens the window.

use clap::Parser;
use tracing::info;

use chord_trainer::config::Args;
use chord_trainer::midi::{self, MidiStatus};
use chord_trainer::session::Session;
use chord_trainer::trainer::Trainer;
use chord_trainer::ui;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_max_level(args.log_level()).init();

    let keys = args.keyboard_range()?;
    let midi = midi::scan_inputs().await;

    if args.list_midi {
        match &midi {
            MidiStatus::Available(ports) => {
                for port in ports {
                    println!("{}: {}", port.index, port.name);
                }
            }
            MidiStatus::Unavailable(reason) => println!("{}", reason),
        }
        return Ok(());
    }

    info!("Keyboard from {} to {}", args.start_note, args.end_note);
    let session = Session::with_seed(args.timings(), args.seed);
    let trainer = Trainer::new(session);
    ui::run_ui(trainer, keys, midi, args.midi_input)?;
    Ok(())
}
