//! MIDI input: port discovery, connection, and decoding note on/off messages.

use midir::{Ignore, MidiInput, MidiInputConnection};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::input::{InputEvent, InputSender, InputSource, NoteAction};
use crate::theory::Note;

const CLIENT_NAME: &str = "Chord Trainer";

#[derive(Error, Debug)]
pub enum MidiError {
    #[error("failed to create MIDI input: {0}")]
    Init(#[from] midir::InitError),

    #[error("no MIDI input devices found")]
    NoDevices,

    #[error("MIDI input {0} does not exist")]
    UnknownPort(usize),

    #[error("failed to connect to MIDI input device: {0}")]
    Connect(String),

    #[error("MIDI scan did not complete: {0}")]
    Scan(String),
}

/// A MIDI input port as offered to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

/// Outcome of scanning for devices, shown on the start screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MidiStatus {
    Available(Vec<MidiPortInfo>),
    /// Scanning failed or found nothing. The on-screen keyboard still works.
    Unavailable(String),
}

impl MidiStatus {
    pub fn ports(&self) -> &[MidiPortInfo] {
        match self {
            MidiStatus::Available(ports) => ports,
            MidiStatus::Unavailable(_) => &[],
        }
    }
}

/// Enumerates MIDI inputs off the async runtime; device scanning can block.
pub async fn scan_inputs() -> MidiStatus {
    let scanned = tokio::task::spawn_blocking(list_inputs)
        .await
        .map_err(|e| MidiError::Scan(e.to_string()))
        .and_then(|listed| listed);

    match scanned {
        Ok(ports) => {
            info!("Available MIDI input ports:");
            for port in &ports {
                info!("Port {}: {}", port.index, port.name);
            }
            MidiStatus::Available(ports)
        }
        Err(e) => {
            warn!("{}, continuing with the on-screen keyboard only", e);
            MidiStatus::Unavailable(e.to_string())
        }
    }
}

pub fn list_inputs() -> Result<Vec<MidiPortInfo>, MidiError> {
    let midi_input = MidiInput::new(CLIENT_NAME)?;
    let ports = midi_input.ports();
    if ports.is_empty() {
        return Err(MidiError::NoDevices);
    }

    Ok(ports
        .iter()
        .enumerate()
        .map(|(index, port)| MidiPortInfo {
            index,
            name: midi_input
                .port_name(port)
                .unwrap_or_else(|_| "Unknown".to_string()),
        })
        .collect())
}

/// A live subscription to one MIDI input. Dropping it unsubscribes.
pub struct MidiListener {
    name: String,
    connection: MidiInputConnection<InputSender>,
}

impl MidiListener {
    pub fn close(self) {
        let _ = self.connection.close();
        info!("Disconnected MIDI input {}", self.name);
    }
}

impl std::fmt::Debug for MidiListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiListener").field("name", &self.name).finish()
    }
}

/// Connects to input `index` and forwards its note events into `sender`.
pub fn connect(index: usize, sender: InputSender) -> Result<MidiListener, MidiError> {
    let mut midi_input = MidiInput::new(CLIENT_NAME)?;
    midi_input.ignore(Ignore::All);

    let ports = midi_input.ports();
    let port = ports.get(index).ok_or(MidiError::UnknownPort(index))?;
    let name = midi_input
        .port_name(port)
        .unwrap_or_else(|_| "Unknown".to_string());

    let connection = midi_input
        .connect(
            port,
            "chord-trainer-input",
            move |_, message, sender| {
                if let Some(action) = parse_message(message) {
                    let event = InputEvent {
                        source: InputSource::Midi,
                        action,
                    };
                    if sender.send(event).is_err() {
                        debug!("Input queue closed, dropping {:?}", event);
                    }
                }
            },
            sender,
        )
        .map_err(|e| MidiError::Connect(e.to_string()))?;

    info!("Using MIDI input: {}", name);
    Ok(MidiListener { name, connection })
}

/// Decodes note-on and note-off channel messages. A note-on with velocity 0 is a note-off.
pub fn parse_message(message: &[u8]) -> Option<NoteAction> {
    if message.len() < 3 {
        return None;
    }
    let status = message[0] & 0xF0;
    let note = Note::from_midi(message[1] & 0x7F).ok()?;
    let velocity = message[2];

    match (status, velocity) {
        (0x90, v) if v > 0 => {
            debug!("Note On: note={}, velocity={}", note, velocity);
            Some(NoteAction::On(note))
        }
        (0x80, _) | (0x90, 0) => {
            debug!("Note Off: note={}", note);
            Some(NoteAction::Off(note))
        }
        _ => {
            debug!("Unhandled MIDI message: {:?}", message);
            None
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
    fn note_on_and_off_on_any_channel() {
        assert_eq!(parse_message(&[0x90, 60, 100]), Some(NoteAction::On(note("C4"))));
        assert_eq!(parse_message(&[0x93, 61, 1]), Some(NoteAction::On(note("C#4"))));
        assert_eq!(parse_message(&[0x80, 64, 40]), Some(NoteAction::Off(note("E4"))));
    }

    #[test]
    fn zero_velocity_note_on_releases() {
        assert_eq!(parse_message(&[0x90, 67, 0]), Some(NoteAction::Off(note("G4"))));
    }

    #[test]
    fn other_messages_are_ignored() {
        assert_eq!(parse_message(&[0xB0, 64, 127]), None);
        assert_eq!(parse_message(&[0xC0, 5]), None);
        assert_eq!(parse_message(&[]), None);
    }

    #[test]
    fn unavailable_status_has_no_ports() {
        let status = MidiStatus::Unavailable("no MIDI input devices found".to_string());
        assert!(status.ports().is_empty());
    }
}
