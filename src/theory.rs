//! Pitch classes, octave-qualified notes and the catalog of triads the trainer asks for.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while reading a note identifier such as `"Eb4"`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NoteError {
    #[error("empty note identifier")]
    Empty,

    #[error("unknown note letter '{0}'")]
    UnknownLetter(char),

    #[error("too many accidentals in '{0}'")]
    Accidental(String),

    #[error("invalid octave in '{0}'")]
    Octave(String),

    #[error("note '{0}' has no octave")]
    MissingOctave(String),

    #[error("note '{0}' is outside the MIDI range")]
    OutOfRange(String),
}

/// One of the twelve enharmonic-normalized pitch classes.
///
/// The canonical label of every black key uses its sharp spelling, which is
/// also how the catalog names its roots.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    /// All pitch classes in ascending order starting at C.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Pitch class for a semitone offset above C, wrapping at the octave.
    pub fn from_semitone(semitone: u8) -> Self {
        Self::ALL[(semitone % 12) as usize]
    }

    /// Semitones above C, in `0..12`.
    pub fn semitone(self) -> u8 {
        self as u8
    }

    pub fn transpose(self, semitones: u8) -> Self {
        Self::from_semitone(self.semitone() + semitones % 12)
    }

    pub fn label(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }

    /// Whether the pitch class sits on a black key of a piano.
    pub fn is_accidental(self) -> bool {
        matches!(
            self,
            PitchClass::CSharp
                | PitchClass::DSharp
                | PitchClass::FSharp
                | PitchClass::GSharp
                | PitchClass::ASharp
        )
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reduce a note spelling, with or without octave, to its canonical pitch class.
///
/// Sharp and flat spellings of the same pitch normalize identically, so
/// `"D#4"`, `"Eb4"` and `"Eb"` all yield [`PitchClass::DSharp`]. Spellings
/// that cross a letter boundary (`"Cb"`, `"E#"`, `"B#"`) wrap around the octave.
pub fn normalize_pitch_class(note: &str) -> Result<PitchClass, NoteError> {
    split_note(note).map(|(semitone, _)| PitchClass::from_semitone(semitone.rem_euclid(12) as u8))
}

/// Splits a spelling into its semitone offset above C (unwrapped, so `"Cb"` is -1)
/// and its octave, if any.
fn split_note(note: &str) -> Result<(i32, Option<i8>), NoteError> {
    let note = note.trim();
    let letter = note.chars().next().ok_or(NoteError::Empty)?;
    let base: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(NoteError::UnknownLetter(letter)),
    };

    let (mut sharps, mut flats) = (0i32, 0i32);
    let mut rest = &note[letter.len_utf8()..];
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            Some('#') | Some('♯') => sharps += 1,
            Some('b') | Some('♭') => flats += 1,
            _ => break,
        }
        rest = chars.as_str();
    }
    // Sharps and flats never mix in one spelling.
    let offset = sharps - flats;
    if (sharps > 0 && flats > 0) || offset.abs() > 2 {
        return Err(NoteError::Accidental(note.to_string()));
    }

    let octave = if rest.is_empty() {
        None
    } else {
        Some(
            rest.parse::<i8>()
                .map_err(|_| NoteError::Octave(note.to_string()))?,
        )
    };

    Ok((base + offset, octave))
}

/// An octave-qualified note, e.g. `C4`. Follows the MIDI convention where C4 is 60.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Note {
    octave: i8,
    pitch_class: PitchClass,
}

impl Note {
    pub fn new(pitch_class: PitchClass, octave: i8) -> Self {
        Self {
            octave,
            pitch_class,
        }
    }

    /// Note for a MIDI note number. Every number in `0..=127` is representable.
    pub fn from_midi(number: u8) -> Result<Self, NoteError> {
        if number > 127 {
            return Err(NoteError::OutOfRange(number.to_string()));
        }
        Ok(Self {
            octave: (number / 12) as i8 - 1,
            pitch_class: PitchClass::from_semitone(number % 12),
        })
    }

    pub fn to_midi(self) -> Option<u8> {
        let number = (self.octave as i32 + 1) * 12 + self.pitch_class.semitone() as i32;
        u8::try_from(number).ok().filter(|n| *n <= 127)
    }

    pub fn pitch_class(self) -> PitchClass {
        self.pitch_class
    }

    pub fn octave(self) -> i8 {
        self.octave
    }

    /// Every note from `start` to `end`, inclusive. Empty if `end` is below `start`.
    pub fn range(start: Note, end: Note) -> Vec<Note> {
        match (start.to_midi(), end.to_midi()) {
            (Some(lo), Some(hi)) => (lo..=hi).filter_map(|n| Note::from_midi(n).ok()).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl FromStr for Note {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (semitone, octave) = split_note(s)?;
        let octave = octave.ok_or_else(|| NoteError::MissingOctave(s.to_string()))?;
        let number = (octave as i32 + 1) * 12 + semitone;
        u8::try_from(number)
            .ok()
            .filter(|n| *n <= 127)
            .map(Note::from_midi)
            .unwrap_or_else(|| Err(NoteError::OutOfRange(s.to_string())))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Quality {
    Major,
    Minor,
}

impl Quality {
    pub const ALL: [Quality; 2] = [Quality::Major, Quality::Minor];

    /// Semitone offsets of the triad members above the root.
    pub fn intervals(self) -> [u8; 3] {
        match self {
            Quality::Major => [0, 4, 7],
            Quality::Minor => [0, 3, 7],
        }
    }

    /// Suffix appended to the root in a chord's display name.
    pub fn suffix(self) -> &'static str {
        match self {
            Quality::Major => "",
            Quality::Minor => "m",
        }
    }
}

/// A triad. Immutable once built; two chords are the same chord when name and root agree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Chord {
    name: String,
    quality: Quality,
    root: PitchClass,
    pitch_classes: BTreeSet<PitchClass>,
}

impl Chord {
    pub fn new(root: PitchClass, quality: Quality) -> Self {
        Self {
            name: format!("{}{}", root, quality.suffix()),
            quality,
            root,
            pitch_classes: quality
                .intervals()
                .iter()
                .map(|&interval| root.transpose(interval))
                .collect(),
        }
    }

    /// Display name, `"C#"` for C# major and `"C#m"` for C# minor.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn root(&self) -> PitchClass {
        self.root
    }

    pub fn pitch_classes(&self) -> &BTreeSet<PitchClass> {
        &self.pitch_classes
    }

    pub fn contains(&self, pitch_class: PitchClass) -> bool {
        self.pitch_classes.contains(&pitch_class)
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Every root in ascending order, each as major then minor.
pub fn build_catalog() -> Vec<Chord> {
    PitchClass::ALL
        .iter()
        .flat_map(|&root| Quality::ALL.iter().map(move |&quality| Chord::new(root, quality)))
        .collect()
}

/// The read-only set of chords a session walks through.
#[derive(Clone, Debug)]
pub struct Catalog {
    chords: Vec<Chord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            chords: build_catalog(),
        }
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    /// Chords not present in `played`, in catalog order.
    pub fn remaining<'a>(&'a self, played: &'a [Chord]) -> impl Iterator<Item = &'a Chord> + 'a {
        self.chords.iter().filter(move |chord| !played.contains(chord))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
