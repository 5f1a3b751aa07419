//! Decides whether the held notes spell the target chord.

use std::collections::BTreeSet;

use tracing::warn;

use crate::input::HeldNotes;
use crate::theory::{normalize_pitch_class, Chord, PitchClass};

/// True iff the held notes are exactly the chord's pitch classes, one note each.
///
/// Octaves are ignored for the comparison but still count as separate keys, so
/// a pitch class doubled in another octave is one note too many.
pub fn is_match_held(chord: &Chord, held: &HeldNotes) -> bool {
    spells_chord(chord, held.notes().iter().map(|note| note.pitch_class()))
}

/// [`is_match_held`] over note spellings such as `"Eb4"` or `"G"`.
///
/// Enharmonic spellings are equivalent. A malformed note makes the whole set a
/// non-match.
pub fn is_match<S: AsRef<str>>(chord: &Chord, held_notes: &[S]) -> bool {
    let mut pitch_classes = Vec::with_capacity(held_notes.len());
    for note in held_notes {
        match normalize_pitch_class(note.as_ref()) {
            Ok(pitch_class) => pitch_classes.push(pitch_class),
            Err(e) => {
                warn!("Ignoring held notes, {}", e);
                return false;
            }
        }
    }
    spells_chord(chord, pitch_classes)
}

fn spells_chord(chord: &Chord, pitch_classes: impl IntoIterator<Item = PitchClass>) -> bool {
    let mut count = 0;
    let held: BTreeSet<PitchClass> = pitch_classes.into_iter().inspect(|_| count += 1).collect();
    count == chord.pitch_classes().len() && held == *chord.pitch_classes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::{Note, Quality};

    fn c_major() -> Chord {
        Chord::new(PitchClass::C, Quality::Major)
    }

    #[test]
    fn exact_triad_matches_in_any_octave() {
        assert!(is_match(&c_major(), &["C4", "E4", "G4"]));
        assert!(is_match(&c_major(), &["G3", "C5", "E2"]));
        assert!(is_match(&c_major(), &["C", "E", "G"]));
    }

    #[test]
    fn enharmonic_spellings_match() {
        let e_flat_minor = Chord::new(PitchClass::DSharp, Quality::Minor);
        assert!(is_match(&e_flat_minor, &["Eb4", "Gb4", "Bb4"]));
        assert!(is_match(&e_flat_minor, &["D#4", "F#4", "A#4"]));

        let b_major = Chord::new(PitchClass::B, Quality::Major);
        assert!(is_match(&b_major, &["Cb4", "Eb4", "Gb4"]));
    }

    #[test]
    fn subsets_and_supersets_do_not_match() {
        assert!(!is_match(&c_major(), &["C4", "E4"]));
        assert!(!is_match(&c_major(), &["C4", "E4", "G4", "B4"]));
        assert!(!is_match::<&str>(&c_major(), &[]));
    }

    #[test]
    fn wrong_quality_does_not_match() {
        assert!(!is_match(&c_major(), &["C4", "Eb4", "G4"]));
    }

    #[test]
    fn malformed_note_is_a_non_match() {
        assert!(!is_match(&c_major(), &["C4", "E4", "X4"]));
    }

    #[test]
    fn doubled_pitch_class_is_not_a_triad() {
        assert!(!is_match(&c_major(), &["C4", "E4", "G4", "C5"]));
        assert!(!is_match(&c_major(), &["C", "E", "G", "C"]));
    }

    #[test]
    fn held_notes_need_one_key_per_chord_tone() {
        let held = |names: &[&str]| -> HeldNotes { names.iter().map(|n| n.parse::<Note>().unwrap()).collect() };
        assert!(is_match_held(&c_major(), &held(&["G3", "C4", "E5"])));
        assert!(!is_match_held(&c_major(), &held(&["C4", "E4", "G4", "C5"])));
        assert!(!is_match_held(&c_major(), &held(&["C4", "E4"])));
        assert!(!is_match_held(&c_major(), &HeldNotes::default()));
    }
}
