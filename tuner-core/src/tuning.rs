//! # Musical Tuning Module
//!
//! Turns a frequency estimate into a tuning verdict: the nearest reference
//! note, the deviation from it in cents, and a coarse tuning state for the
//! display.
//!
//! ## Features
//! - Nearest-note matching against a loaded [`ReferenceTable`]
//! - Cent deviation with a guarded log domain
//! - In-tune / near / out-of-tune classification at fixed thresholds
//! - Sharp/flat direction and Spanish solfège names for the display

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::reference::{ReferenceNote, ReferenceTable};

/// Largest |cents| still reported as in tune.
pub const IN_TUNE_CENTS: f32 = 5.0;
/// Largest |cents| reported as near.
pub const NEAR_CENTS: f32 = 15.0;

/// Letter names to fixed-do solfège, sharps and flats included.
static SOLFEGE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("C", "DO"),
        ("C#", "DO#"),
        ("Db", "REb"),
        ("D", "RE"),
        ("D#", "RE#"),
        ("Eb", "MIb"),
        ("E", "MI"),
        ("F", "FA"),
        ("F#", "FA#"),
        ("Gb", "SOLb"),
        ("G", "SOL"),
        ("G#", "SOL#"),
        ("Ab", "LAb"),
        ("A", "LA"),
        ("A#", "LA#"),
        ("Bb", "SIb"),
        ("B", "SI"),
    ])
});

/// Coarse tuning verdict for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TuningState {
    InTune,
    Near,
    OutOfTune,
    NoSignal,
}

impl TuningState {
    /// Stable identifier used by display themes and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TuningState::InTune => "afinado",
            TuningState::Near => "cerca",
            TuningState::OutOfTune => "desafinado",
            TuningState::NoSignal => "sin_audio",
        }
    }
}

impl fmt::Display for TuningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TuningState::InTune => "in tune",
            TuningState::Near => "near",
            TuningState::OutOfTune => "out of tune",
            TuningState::NoSignal => "no signal",
        };
        f.write_str(label)
    }
}

/// Which way the string has to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Below the reference: tune up.
    Flat,
    /// Above the reference: tune down.
    Sharp,
    Centered,
}

impl Direction {
    pub fn from_cents(cents: f32) -> Self {
        if cents > 0.0 {
            Direction::Sharp
        } else if cents < 0.0 {
            Direction::Flat
        } else {
            Direction::Centered
        }
    }
}

/// Everything the display needs to know about one analysis cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningResult {
    /// Nearest reference note (e.g., "A4").
    pub note: Option<String>,
    /// The same note in solfège (e.g., "LA4").
    pub solfege: Option<String>,
    pub detected_frequency: Option<f32>,
    pub reference_frequency: Option<f32>,
    /// Deviation from the reference; 0.0 when undefined.
    pub cents: f32,
    pub state: TuningState,
    pub direction: Direction,
}

impl TuningResult {
    /// The neutral result reported when there is nothing to analyse.
    pub fn no_signal() -> Self {
        Self {
            note: None,
            solfege: None,
            detected_frequency: None,
            reference_frequency: None,
            cents: 0.0,
            state: TuningState::NoSignal,
            direction: Direction::Centered,
        }
    }

    pub fn has_signal(&self) -> bool {
        self.state != TuningState::NoSignal
    }
}

/// A reference note matched to a detected frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteMatch {
    pub name: String,
    pub frequency: f32,
    /// Absolute distance in Hz between detected and reference frequency.
    pub difference: f32,
}

/// Calculates the deviation from a reference frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
///
/// # Arguments
/// * `detected` - The frequency measured from the audio, in Hz
/// * `reference` - The target note's frequency, in Hz
///
/// # Returns
/// `1200 * log2(detected / reference)`, or 0.0 when either frequency is not
/// positive.
pub fn cents_deviation(detected: f32, reference: f32) -> f32 {
    if !(detected > 0.0 && reference > 0.0) {
        return 0.0;
    }
    let cents = 1200.0 * (detected / reference).log2();
    if cents.is_finite() { cents } else { 0.0 }
}

/// Buckets a deviation into a tuning state. Boundaries belong to the tighter
/// band: exactly 5 cents is in tune, exactly 15 cents is near.
pub fn classify(cents: f32) -> TuningState {
    let magnitude = cents.abs();
    if magnitude <= IN_TUNE_CENTS {
        TuningState::InTune
    } else if magnitude <= NEAR_CENTS {
        TuningState::Near
    } else {
        TuningState::OutOfTune
    }
}

/// Converts a letter note name to solfège, keeping the octave ("A4" -> "LA4").
///
/// Unknown letter names are passed through unchanged.
pub fn solfege_name(note: &str) -> String {
    let split = note
        .find(|c: char| c.is_ascii_digit() || c == '-')
        .unwrap_or(note.len());
    let (base, octave) = note.split_at(split);
    let base = SOLFEGE.get(base).copied().unwrap_or(base);
    format!("{base}{octave}")
}

/// Maps frequencies to tuning verdicts against a reference table.
#[derive(Debug, Clone)]
pub struct TuningClassifier {
    table: Arc<ReferenceTable>,
}

impl TuningClassifier {
    pub fn new(table: Arc<ReferenceTable>) -> Self {
        Self { table }
    }

    /// Finds the closest musical note to a given frequency.
    ///
    /// `None` when the frequency is absent or not positive, or the table is
    /// empty.
    pub fn nearest_note(&self, freq: Option<f32>) -> Option<NoteMatch> {
        let freq = freq?;
        self.table
            .nearest(freq)
            .map(|ReferenceNote { name, frequency }| NoteMatch {
                name: name.clone(),
                frequency: *frequency,
                difference: (freq - frequency).abs(),
            })
    }

    /// Full verdict for one frequency estimate.
    ///
    /// # Arguments
    /// * `freq` - The estimated fundamental, `None` when no pitch was found
    ///
    /// # Returns
    /// A [`TuningResult`] naming the nearest note with its deviation and
    /// state, or the no-signal result when there is nothing to match.
    pub fn analyze(&self, freq: Option<f32>) -> TuningResult {
        let (Some(detected), Some(matched)) = (freq, self.nearest_note(freq)) else {
            return TuningResult::no_signal();
        };

        let cents = cents_deviation(detected, matched.frequency);
        TuningResult {
            solfege: Some(solfege_name(&matched.name)),
            note: Some(matched.name),
            detected_frequency: Some(detected),
            reference_frequency: Some(matched.frequency),
            cents,
            state: classify(cents),
            direction: Direction::from_cents(cents),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> TuningClassifier {
        TuningClassifier::new(Arc::new(ReferenceTable::from_notes([
            ("A4", 440.0),
            ("C4", 261.63),
        ])))
    }

    #[test]
    fn exact_match_has_zero_cents() {
        for f in [27.5, 261.63, 440.0, 4186.0] {
            assert_eq!(cents_deviation(f, f), 0.0);
        }
    }

    #[test]
    fn one_semitone_is_a_hundred_cents() {
        let up = cents_deviation(440.0 * 2f32.powf(1.0 / 12.0), 440.0);
        assert!((up - 100.0).abs() < 1e-3);
        assert!((cents_deviation(220.0, 440.0) + 1200.0).abs() < 1e-3);
    }

    #[test]
    fn cents_grow_with_ratio() {
        let mut previous = f32::NEG_INFINITY;
        for detected in (400..=480).map(|f| f as f32) {
            let cents = cents_deviation(detected, 440.0);
            assert!(cents >= previous);
            previous = cents;
        }
    }

    #[test]
    fn invalid_inputs_give_zero_cents() {
        assert_eq!(cents_deviation(0.0, 440.0), 0.0);
        assert_eq!(cents_deviation(440.0, -1.0), 0.0);
        assert_eq!(cents_deviation(f32::NAN, 440.0), 0.0);
    }

    #[test]
    fn classification_bands_include_their_upper_boundary() {
        assert_eq!(classify(0.0), TuningState::InTune);
        assert_eq!(classify(5.0), TuningState::InTune);
        assert_eq!(classify(-5.0), TuningState::InTune);
        assert_eq!(classify(5.01), TuningState::Near);
        assert_eq!(classify(15.0), TuningState::Near);
        assert_eq!(classify(-15.0), TuningState::Near);
        assert_eq!(classify(15.01), TuningState::OutOfTune);
        assert_eq!(classify(-600.0), TuningState::OutOfTune);
    }

    #[test]
    fn nearest_note_reports_difference() {
        let c = classifier();
        let a = c.nearest_note(Some(445.0)).unwrap();
        assert_eq!(a.name, "A4");
        assert_eq!(a.difference, 5.0);
        assert_eq!(c.nearest_note(Some(260.0)).unwrap().name, "C4");
        assert!(c.nearest_note(None).is_none());
        assert!(c.nearest_note(Some(0.0)).is_none());
    }

    #[test]
    fn analyze_fills_every_field() {
        let result = classifier().analyze(Some(446.0));
        assert_eq!(result.note.as_deref(), Some("A4"));
        assert_eq!(result.solfege.as_deref(), Some("LA4"));
        assert_eq!(result.reference_frequency, Some(440.0));
        assert!((result.cents - 23.45).abs() < 0.05);
        assert_eq!(result.state, TuningState::OutOfTune);
        assert_eq!(result.direction, Direction::Sharp);
    }

    #[test]
    fn near_states_carry_direction() {
        let c = classifier();
        let sharp = c.analyze(Some(443.0));
        let flat = c.analyze(Some(437.0));
        assert_eq!(sharp.state, TuningState::Near);
        assert_eq!(flat.state, TuningState::Near);
        assert_eq!(sharp.direction, Direction::Sharp);
        assert_eq!(flat.direction, Direction::Flat);
    }

    #[test]
    fn analyze_without_frequency_is_no_signal() {
        assert_eq!(classifier().analyze(None), TuningResult::no_signal());
        assert_eq!(classifier().analyze(Some(-2.0)), TuningResult::no_signal());
        let empty = TuningClassifier::new(Arc::new(ReferenceTable::empty()));
        assert_eq!(empty.analyze(Some(440.0)).state, TuningState::NoSignal);
    }

    #[test]
    fn solfege_keeps_accidentals_and_octave() {
        assert_eq!(solfege_name("A4"), "LA4");
        assert_eq!(solfege_name("C#3"), "DO#3");
        assert_eq!(solfege_name("Bb2"), "SIb2");
        assert_eq!(solfege_name("H7"), "H7");
    }

    #[test]
    fn state_identifiers_are_stable() {
        assert_eq!(TuningState::InTune.as_str(), "afinado");
        assert_eq!(TuningState::NoSignal.as_str(), "sin_audio");
    }
}
