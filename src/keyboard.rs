//! Turns pointer and computer-key gestures on the on-screen piano into note events.

use tracing::debug;

use crate::input::{HeldNotes, InputEvent, InputSender, InputSource};
use crate::theory::Note;

/// Computer keys covering one octave up from the lowest key, white and black
/// keys laid out like a piano on a QWERTY row.
const SHORTCUTS: [char; 13] = ['a', 'w', 's', 'e', 'd', 'f', 't', 'g', 'y', 'h', 'u', 'j', 'k'];

/// The on-screen piano as an input producer.
///
/// Pressing a key toggles it. Dragging onto another key while the pointer
/// button is held toggles that key too.
#[derive(Debug)]
pub struct VirtualKeyboard {
    keys: Vec<Note>,
    sender: InputSender,
    /// Key under a pressed pointer, so moving within it does not toggle again.
    dragging_over: Option<Note>,
    pointer_down: bool,
}

impl VirtualKeyboard {
    pub fn new(keys: Vec<Note>, sender: InputSender) -> Self {
        Self {
            keys,
            sender,
            dragging_over: None,
            pointer_down: false,
        }
    }

    pub fn keys(&self) -> &[Note] {
        &self.keys
    }

    pub fn pointer_pressed(&mut self, key: Option<Note>, held: &HeldNotes) {
        self.pointer_down = true;
        self.dragging_over = key;
        if let Some(key) = key {
            self.toggle(key, held, InputSource::Pointer);
        }
    }

    /// Pointer moved onto `key`. Only toggles while the button is held.
    pub fn pointer_entered(&mut self, key: Option<Note>, held: &HeldNotes) {
        if !self.pointer_down || key == self.dragging_over {
            return;
        }
        self.dragging_over = key;
        if let Some(key) = key {
            self.toggle(key, held, InputSource::Pointer);
        }
    }

    pub fn pointer_released(&mut self) {
        self.pointer_down = false;
        self.dragging_over = None;
    }

    pub fn shortcut_for(&self, note: Note) -> Option<char> {
        let offset = self.keys.iter().position(|k| *k == note)?;
        SHORTCUTS.get(offset).copied()
    }

    fn note_for_shortcut(&self, shortcut: char) -> Option<Note> {
        let offset = SHORTCUTS
            .iter()
            .position(|c| *c == shortcut.to_ascii_lowercase())?;
        self.keys.get(offset).copied()
    }

    /// Computer key went down. Holds the note until the key is released.
    pub fn shortcut_pressed(&mut self, shortcut: char) {
        if let Some(note) = self.note_for_shortcut(shortcut) {
            self.emit(InputEvent::on(InputSource::ComputerKeyboard, note));
        }
    }

    pub fn shortcut_released(&mut self, shortcut: char) {
        if let Some(note) = self.note_for_shortcut(shortcut) {
            self.emit(InputEvent::off(InputSource::ComputerKeyboard, note));
        }
    }

    fn toggle(&self, key: Note, held: &HeldNotes, source: InputSource) {
        let event = if held.contains(key) {
            InputEvent::off(source, key)
        } else {
            InputEvent::on(source, key)
        };
        self.emit(event);
    }

    fn emit(&self, event: InputEvent) {
        if self.sender.send(event).is_err() {
            debug!("Input queue closed, dropping {:?}", event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{channel, InputReceiver, NoteAction};

    fn note(s: &str) -> Note {
        s.parse().unwrap()
    }

    fn keyboard() -> (VirtualKeyboard, InputReceiver) {
        let (tx, rx) = channel();
        let keys = Note::range(note("C3"), note("B4"));
        (VirtualKeyboard::new(keys, tx), rx)
    }

    fn drain(rx: &mut InputReceiver) -> Vec<NoteAction> {
        let mut actions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            actions.push(event.action);
        }
        actions
    }

    #[test]
    fn press_toggles_the_key() {
        let (mut keyboard, mut rx) = keyboard();
        keyboard.pointer_pressed(Some(note("C3")), &HeldNotes::default());
        keyboard.pointer_released();
        let held: HeldNotes = [note("C3")].into_iter().collect();
        keyboard.pointer_pressed(Some(note("C3")), &held);
        assert_eq!(
            drain(&mut rx),
            vec![NoteAction::On(note("C3")), NoteAction::Off(note("C3"))]
        );
    }

    #[test]
    fn dragging_presses_each_entered_key_once() {
        let (mut keyboard, mut rx) = keyboard();
        let none = HeldNotes::default();
        keyboard.pointer_pressed(Some(note("C3")), &none);
        keyboard.pointer_entered(Some(note("C3")), &none);
        keyboard.pointer_entered(Some(note("D3")), &none);
        keyboard.pointer_entered(None, &none);
        keyboard.pointer_entered(Some(note("E3")), &none);
        keyboard.pointer_released();
        keyboard.pointer_entered(Some(note("F3")), &none);

        assert_eq!(
            drain(&mut rx),
            vec![
                NoteAction::On(note("C3")),
                NoteAction::On(note("D3")),
                NoteAction::On(note("E3")),
            ]
        );
    }

    #[test]
    fn pressing_outside_the_keys_still_allows_drag_in() {
        let (mut keyboard, mut rx) = keyboard();
        let none = HeldNotes::default();
        keyboard.pointer_pressed(None, &none);
        keyboard.pointer_entered(Some(note("G3")), &none);
        assert_eq!(drain(&mut rx), vec![NoteAction::On(note("G3"))]);
    }

    #[test]
    fn shortcuts_cover_one_octave_from_the_lowest_key() {
        let (mut keyboard, mut rx) = keyboard();
        assert_eq!(keyboard.shortcut_for(note("C3")), Some('a'));
        assert_eq!(keyboard.shortcut_for(note("C#3")), Some('w'));
        assert_eq!(keyboard.shortcut_for(note("C4")), Some('k'));
        assert_eq!(keyboard.shortcut_for(note("C#4")), None);

        keyboard.shortcut_pressed('E');
        keyboard.shortcut_released('e');
        keyboard.shortcut_pressed('z');
        assert_eq!(
            drain(&mut rx),
            vec![NoteAction::On(note("D#3")), NoteAction::Off(note("D#3"))]
        );
    }
}
