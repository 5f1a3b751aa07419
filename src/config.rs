//! Command-line options.

use std::time::Duration;

use clap::{ArgAction, Parser};
use thiserror::Error;
use tracing::Level;

use crate::state::Timings;
use crate::theory::Note;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("keyboard range {start}..{end} is empty")]
    EmptyRange { start: Note, end: Note },
}

/// Practice major and minor triads on an on-screen piano or a MIDI keyboard.
#[derive(Parser, Debug)]
#[command(name = "chord_trainer", version, about)]
pub struct Args {
    /// MIDI input to listen to, by index (see --list-midi)
    #[arg(long, value_name = "INDEX")]
    pub midi_input: Option<usize>,

    /// Print the available MIDI inputs and exit
    #[arg(long)]
    pub list_midi: bool,

    /// Lowest key of the on-screen piano
    #[arg(long, default_value = "C3")]
    pub start_note: Note,

    /// Highest key of the on-screen piano
    #[arg(long, default_value = "B4")]
    pub end_note: Note,

    /// Seed for the chord order
    #[arg(long)]
    pub seed: Option<u64>,

    /// Milliseconds each countdown digit is shown
    #[arg(long, default_value_t = 500)]
    pub countdown_ms: u64,

    /// Milliseconds the success screen is shown after a correct chord
    #[arg(long, default_value_t = 500)]
    pub correct_ms: u64,

    /// More logging, repeat for trace output
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn timings(&self) -> Timings {
        Timings {
            countdown_step: Duration::from_millis(self.countdown_ms),
            correct_delay: Duration::from_millis(self.correct_ms),
        }
    }

    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    pub fn keyboard_range(&self) -> Result<Vec<Note>, ConfigError> {
        let keys = Note::range(self.start_note, self.end_note);
        if keys.is_empty() {
            return Err(ConfigError::EmptyRange {
                start: self.start_note,
                end: self.end_note,
            });
        }
        Ok(keys)
    }
}
