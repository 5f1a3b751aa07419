//! The event loop tying input producers, the held-note set and the session together.

use std::time::Instant;

use tracing::debug;

use crate::input::{self, InputAggregator, InputReceiver, InputSender};
use crate::session::Session;
use crate::state::Event;
use crate::theory::Note;

/// What a single piano key should show.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyState {
    pub held: bool,
    /// The key's pitch class belongs to the current chord. Feedback only.
    pub correct: bool,
}

/// Single consumer of the input queue.
///
/// Producers (pointer, computer keyboard, MIDI thread) only ever hold an
/// [`InputSender`]. [`Trainer::pump`] applies their events in arrival order
/// and forwards every resulting snapshot to the session.
#[derive(Debug)]
pub struct Trainer {
    session: Session,
    aggregator: InputAggregator,
    sender: InputSender,
    inputs: InputReceiver,
}

impl Trainer {
    pub fn new(session: Session) -> Self {
        let (sender, inputs) = input::channel();
        Self {
            session,
            aggregator: InputAggregator::new(),
            sender,
            inputs,
        }
    }

    pub fn input_sender(&self) -> InputSender {
        self.sender.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn aggregator(&self) -> &InputAggregator {
        &self.aggregator
    }

    pub fn press_start(&mut self, now: Instant) {
        self.send(Event::PressStart, now);
    }

    pub fn replay(&mut self, now: Instant) {
        self.send(Event::Replay, now);
    }

    /// Drains queued input, then fires due timers.
    pub fn pump(&mut self, now: Instant) {
        while let Ok(event) = self.inputs.try_recv() {
            let held = self.aggregator.apply(event);
            self.send(Event::PlayNotes(held), now);
        }
        self.session.advance(now);
        self.release_piano(now);
    }

    pub fn key_state(&self, note: Note) -> KeyState {
        let correct = match &self.session.context().current_chord {
            Some(chord) => chord.contains(note.pitch_class()),
            None => true,
        };
        KeyState {
            held: self.aggregator.is_held(note),
            correct,
        }
    }

    fn send(&mut self, event: Event, now: Instant) {
        self.session.send(event, now);
        self.release_piano(now);
    }

    fn release_piano(&mut self, now: Instant) {
        if self.session.take_piano_reset() {
            debug!("Resetting piano");
            let held = self.aggregator.reset();
            self.session.send(Event::PlayNotes(held), now);
        }
    }
}
