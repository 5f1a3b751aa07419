//! Chord trainer: shows a major or minor triad, listens to an on-screen piano
//! and an optional MIDI keyboard, and times how long it takes to play all 24.

pub mod config;
pub mod input;
pub mod keyboard;
pub mod matcher;
pub mod midi;
pub mod session;
pub mod state;
pub mod theory;
pub mod trainer;
pub mod ui;
