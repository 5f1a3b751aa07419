//! Merges note on/off events from every input producer into one held-note set.

use std::collections::BTreeSet;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::theory::{Note, PitchClass};

/// Where an input event came from. Only used for logging.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputSource {
    Pointer,
    ComputerKeyboard,
    Midi,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NoteAction {
    On(Note),
    Off(Note),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InputEvent {
    pub source: InputSource,
    pub action: NoteAction,
}

impl InputEvent {
    pub fn on(source: InputSource, note: Note) -> Self {
        Self {
            source,
            action: NoteAction::On(note),
        }
    }

    pub fn off(source: InputSource, note: Note) -> Self {
        Self {
            source,
            action: NoteAction::Off(note),
        }
    }
}

pub type InputSender = UnboundedSender<InputEvent>;
pub type InputReceiver = UnboundedReceiver<InputEvent>;

/// The queue every producer writes into. The receiving end is drained on the UI thread.
pub fn channel() -> (InputSender, InputReceiver) {
    mpsc::unbounded_channel()
}

/// Snapshot of the notes held at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeldNotes {
    notes: BTreeSet<Note>,
}

impl HeldNotes {
    pub fn notes(&self) -> &BTreeSet<Note> {
        &self.notes
    }

    /// The held notes with octaves dropped.
    pub fn pitch_classes(&self) -> BTreeSet<PitchClass> {
        self.notes.iter().map(|note| note.pitch_class()).collect()
    }

    pub fn contains(&self, note: Note) -> bool {
        self.notes.contains(&note)
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

impl FromIterator<Note> for HeldNotes {
    fn from_iter<I: IntoIterator<Item = Note>>(iter: I) -> Self {
        Self {
            notes: iter.into_iter().collect(),
        }
    }
}

/// Owns the set of currently held notes.
///
/// Every mutation returns the resulting snapshot, which the caller forwards
/// to the session as a `PlayNotes` event.
#[derive(Debug, Default)]
pub struct InputAggregator {
    held: BTreeSet<Note>,
}

impl InputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_on(&mut self, note: Note) -> HeldNotes {
        self.held.insert(note);
        self.snapshot()
    }

    pub fn note_off(&mut self, note: Note) -> HeldNotes {
        self.held.remove(&note);
        self.snapshot()
    }

    /// Releases everything at once without per-note off events.
    pub fn reset(&mut self) -> HeldNotes {
        if !self.held.is_empty() {
            debug!("Releasing {} held notes", self.held.len());
        }
        self.held.clear();
        self.snapshot()
    }

    pub fn apply(&mut self, event: InputEvent) -> HeldNotes {
        debug!("{:?} from {:?}", event.action, event.source);
        match event.action {
            NoteAction::On(note) => self.note_on(note),
            NoteAction::Off(note) => self.note_off(note),
        }
    }

    pub fn is_held(&self, note: Note) -> bool {
        self.held.contains(&note)
    }

    pub fn snapshot(&self) -> HeldNotes {
        HeldNotes {
            notes: self.held.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(s: &str) -> Note {
        s.parse().unwrap()
    }

    #[test]
    fn held_set_follows_on_events() {
        let mut aggregator = InputAggregator::new();
        aggregator.note_on(note("C4"));
        aggregator.note_on(note("E4"));
        let held = aggregator.note_on(note("G4"));

        let expected: BTreeSet<_> = [PitchClass::C, PitchClass::E, PitchClass::G].into_iter().collect();
        assert_eq!(held.pitch_classes(), expected);

        let held = aggregator.reset();
        assert!(held.is_empty());
        assert!(!aggregator.is_held(note("C4")));
    }

    #[test]
    fn on_and_off_are_idempotent() {
        let mut aggregator = InputAggregator::new();
        aggregator.note_on(note("C4"));
        let held = aggregator.note_on(note("C4"));
        assert_eq!(held.notes().len(), 1);

        aggregator.note_off(note("C4"));
        let held = aggregator.note_off(note("C4"));
        assert!(held.is_empty());

        let held = aggregator.note_off(note("D4"));
        assert!(held.is_empty());
    }

    #[test]
    fn octaves_are_tracked_separately() {
        let mut aggregator = InputAggregator::new();
        aggregator.note_on(note("C4"));
        aggregator.note_on(note("C5"));
        let held = aggregator.note_off(note("C5"));
        assert!(held.contains(note("C4")));
        assert!(!held.contains(note("C5")));
        assert_eq!(held.pitch_classes().len(), 1);
    }

    #[test]
    fn producers_share_one_queue() {
        let (tx, mut rx) = channel();
        let midi = tx.clone();
        tx.send(InputEvent::on(InputSource::Pointer, note("C4"))).unwrap();
        midi.send(InputEvent::on(InputSource::Midi, note("E4"))).unwrap();
        tx.send(InputEvent::off(InputSource::Pointer, note("C4"))).unwrap();

        let mut aggregator = InputAggregator::new();
        let mut last = HeldNotes::default();
        while let Ok(event) = rx.try_recv() {
            last = aggregator.apply(event);
        }
        assert_eq!(last, [note("E4")].into_iter().collect::<HeldNotes>());
    }
}
