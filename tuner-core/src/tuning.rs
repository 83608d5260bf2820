//! # Musical Tuning Module
//!
//! Guitar tuning tables and the matching of a detected frequency against the
//! active table.
//!
//! ## Features
//! - Built-in six-string tunings (Standard, Drop D, Half-Step Down, ...)
//! - Custom tunings validated at load time
//! - Nearest-note matching with signed error in Hz and cents

use crate::error::{Result, TunerError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Represents a single target note with its name and frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Note name (e.g., "E2", "F#3", "Bb3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

/// An ordered, named set of target notes. Iteration order is string order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    pub name: String,
    pub notes: Vec<Note>,
}

impl Tuning {
    /// Builds a validated tuning.
    ///
    /// # Errors
    /// * `Configuration` - if the table is empty, a note name is blank, or a
    ///   target frequency is not a positive finite number
    pub fn new(name: impl Into<String>, notes: Vec<Note>) -> Result<Self> {
        let tuning = Self { name: name.into(), notes };
        tuning.validate()?;
        Ok(tuning)
    }

    fn from_table(name: &str, table: &[(&str, f32)]) -> Self {
        Self {
            name: name.to_string(),
            notes: table
                .iter()
                .map(|&(note, frequency)| Note { name: note.to_string(), frequency })
                .collect(),
        }
    }

    /// Checks the invariants every tuning table must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TunerError::config("tuning name must not be empty"));
        }
        if self.notes.is_empty() {
            return Err(TunerError::config(format!("tuning '{}' has no notes", self.name)));
        }
        for note in &self.notes {
            if note.name.trim().is_empty() {
                return Err(TunerError::config(format!(
                    "tuning '{}' contains a note without a name",
                    self.name
                )));
            }
            if !(note.frequency.is_finite() && note.frequency > 0.0) {
                return Err(TunerError::config(format!(
                    "note {} in tuning '{}' has non-positive frequency {}",
                    note.name, self.name, note.frequency
                )));
            }
        }
        Ok(())
    }
}

// Tunings from https://pages.mtu.edu/~suits/notefreqs.html
const STANDARD: [(&str, f32); 6] = [
    ("E2", 82.4), ("A2", 110.0), ("D3", 146.8), ("G3", 196.0), ("B3", 246.9), ("E4", 329.6),
];
const DROP_D: [(&str, f32); 6] = [
    ("D2", 73.4), ("A2", 110.0), ("D3", 146.8), ("G3", 196.0), ("B3", 246.9), ("E4", 329.6),
];
const HALF_STEP_DOWN: [(&str, f32); 6] = [
    ("Eb2", 77.8), ("Ab2", 103.8), ("Db3", 138.6), ("Gb3", 185.0), ("Bb3", 233.1), ("Eb4", 311.1),
];
const OPEN_G: [(&str, f32); 6] = [
    ("D2", 73.4), ("G2", 98.0), ("D3", 146.8), ("G3", 196.0), ("B3", 246.9), ("D4", 293.7),
];
const DADGAD: [(&str, f32); 6] = [
    ("D2", 73.4), ("A2", 110.0), ("D3", 146.8), ("G3", 196.0), ("A3", 220.0), ("D4", 293.7),
];
const OPEN_D: [(&str, f32); 6] = [
    ("D2", 73.4), ("A2", 110.0), ("D3", 146.8), ("F#3", 185.0), ("A3", 220.0), ("D4", 293.7),
];
const WHOLE_STEP_DOWN: [(&str, f32); 6] = [
    ("D2", 73.4), ("G2", 98.0), ("C3", 130.8), ("F3", 174.6), ("A3", 220.0), ("D4", 293.7),
];
const C_SHARP_STANDARD: [(&str, f32); 6] = [
    ("C#2", 69.3), ("F#2", 92.5), ("B2", 123.5), ("E3", 164.8), ("G#3", 207.7), ("C#4", 277.2),
];

/// Built-in tunings, in menu order. The first one is the default.
pub static BUILTIN_TUNINGS: Lazy<Vec<Tuning>> = Lazy::new(|| {
    vec![
        Tuning::from_table("Standard", &STANDARD),
        Tuning::from_table("Drop D", &DROP_D),
        Tuning::from_table("Half-Step Down", &HALF_STEP_DOWN),
        Tuning::from_table("Open G", &OPEN_G),
        Tuning::from_table("DADGAD", &DADGAD),
        Tuning::from_table("Open D", &OPEN_D),
        Tuning::from_table("Whole-Step Down", &WHOLE_STEP_DOWN),
        Tuning::from_table("C# Standard", &C_SHARP_STANDARD),
    ]
});

/// Lower-cases a tuning name and drops separators so that "drop-d",
/// "Drop D" and "DROP_D" all refer to the same tuning.
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// The set of tunings a user can choose from.
#[derive(Debug, Clone)]
pub struct TuningLibrary {
    tunings: Vec<Tuning>,
}

impl Default for TuningLibrary {
    fn default() -> Self {
        Self { tunings: BUILTIN_TUNINGS.clone() }
    }
}

impl TuningLibrary {
    /// Built-in tunings followed by `custom` ones.
    ///
    /// # Errors
    /// * `Configuration` - if a custom tuning is invalid or its name clashes
    ///   with one already in the library
    pub fn with_custom(custom: Vec<Tuning>) -> Result<Self> {
        let mut library = Self::default();
        for tuning in custom {
            tuning.validate()?;
            if library.find(&tuning.name).is_some() {
                return Err(TunerError::config(format!(
                    "duplicate tuning name '{}'",
                    tuning.name
                )));
            }
            library.tunings.push(tuning);
        }
        Ok(library)
    }

    /// Looks up a tuning by name, ignoring case, spaces, hyphens and underscores.
    pub fn find(&self, name: &str) -> Option<&Tuning> {
        let wanted = normalize_name(name);
        self.tunings.iter().find(|t| normalize_name(&t.name) == wanted)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tunings.iter().map(|t| t.name.as_str())
    }

    pub fn tunings(&self) -> &[Tuning] {
        &self.tunings
    }
}

/// Result of matching a frequency against a tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteMatch {
    pub closest_note: String,
    pub target_freq: f32,
    /// `peak - target`: negative is flat, positive is sharp
    pub error_hz: f32,
    pub error_cents: f32,
}

/// Finds the closest note in `tuning` to a given frequency.
///
/// Linear scan over the tuning in order; on equal distance the first note
/// wins.
///
/// # Arguments
/// * `freq` - Detected frequency in Hz
/// * `tuning` - Active tuning table
///
/// # Returns
/// * `None` only if the tuning has no notes, which validated tunings never do
pub fn find_nearest_note(freq: f32, tuning: &Tuning) -> Option<NoteMatch> {
    let mut closest: Option<&Note> = None;
    for note in &tuning.notes {
        let distance = (freq - note.frequency).abs();
        match closest {
            Some(best) if distance >= (freq - best.frequency).abs() => {}
            _ => closest = Some(note),
        }
    }

    closest.map(|note| NoteMatch {
        closest_note: note.name.clone(),
        target_freq: note.frequency,
        error_hz: freq - note.frequency,
        error_cents: calculate_cents_deviation(freq, note.frequency),
    })
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
///
/// Returns 0 when either frequency is not a positive finite number.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    if !(freq.is_finite() && freq > 0.0 && target_freq.is_finite() && target_freq > 0.0) {
        return 0.0;
    }
    1200.0 * (freq / target_freq).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_note_tuning() -> Tuning {
        Tuning::new(
            "Test",
            vec![
                Note { name: "A2".into(), frequency: 110.0 },
                Note { name: "E4".into(), frequency: 329.6 },
            ],
        )
        .unwrap()
    }

    #[test]
    fn sharp_a2_matches_with_positive_error() {
        let m = find_nearest_note(112.0, &two_note_tuning()).unwrap();
        assert_eq!(m.closest_note, "A2");
        assert_eq!(m.target_freq, 110.0);
        assert!((m.error_hz - 2.0).abs() < 1e-5);
        assert!(m.error_cents > 0.0);
    }

    #[test]
    fn flat_note_has_negative_error() {
        let m = find_nearest_note(320.0, &two_note_tuning()).unwrap();
        assert_eq!(m.closest_note, "E4");
        assert!(m.error_hz < 0.0);
        assert!(m.error_cents < 0.0);
    }

    #[test]
    fn equal_distance_prefers_first_note() {
        let tuning = Tuning::new(
            "Tie",
            vec![
                Note { name: "low".into(), frequency: 100.0 },
                Note { name: "high".into(), frequency: 200.0 },
            ],
        )
        .unwrap();
        assert_eq!(find_nearest_note(150.0, &tuning).unwrap().closest_note, "low");
    }

    #[test]
    fn cents_are_guarded_against_non_positive_input() {
        assert_eq!(calculate_cents_deviation(0.0, 110.0), 0.0);
        assert_eq!(calculate_cents_deviation(-5.0, 110.0), 0.0);
        assert!((calculate_cents_deviation(220.0, 110.0) - 1200.0).abs() < 1e-3);
        assert!((calculate_cents_deviation(110.0, 220.0) + 1200.0).abs() < 1e-3);
    }

    #[test]
    fn zero_frequency_still_matches_lowest_note() {
        let m = find_nearest_note(0.0, &two_note_tuning()).unwrap();
        assert_eq!(m.closest_note, "A2");
        assert_eq!(m.error_cents, 0.0);
    }

    #[test]
    fn invalid_tunings_are_rejected() {
        assert!(Tuning::new("Empty", vec![]).is_err());
        assert!(Tuning::new("Zero", vec![Note { name: "X".into(), frequency: 0.0 }]).is_err());
        assert!(Tuning::new("Negative", vec![Note { name: "X".into(), frequency: -82.4 }]).is_err());
        assert!(Tuning::new("Blank", vec![Note { name: " ".into(), frequency: 82.4 }]).is_err());
    }

    #[test]
    fn builtin_tunings_are_valid_and_findable() {
        let library = TuningLibrary::default();
        assert_eq!(library.tunings().len(), 8);
        for tuning in library.tunings() {
            tuning.validate().unwrap();
            assert_eq!(tuning.notes.len(), 6);
        }
        assert_eq!(library.find("drop-d").unwrap().notes[0].name, "D2");
        assert_eq!(library.find("HALF_STEP_DOWN").unwrap().name, "Half-Step Down");
        assert_eq!(library.find("dadgad").unwrap().notes[4].frequency, 220.0);
        assert!(library.find("seven string").is_none());
        assert_eq!(library.names().next(), Some("Standard"));
    }

    #[test]
    fn custom_tunings_extend_library_but_must_be_unique() {
        let custom = Tuning::new("Bass", vec![Note { name: "E1".into(), frequency: 41.2 }]).unwrap();
        let library = TuningLibrary::with_custom(vec![custom]).unwrap();
        assert_eq!(library.find("bass").unwrap().notes[0].name, "E1");

        let clash = Tuning::new("standard", vec![Note { name: "E1".into(), frequency: 41.2 }]).unwrap();
        assert!(TuningLibrary::with_custom(vec![clash]).is_err());
    }
}
