//! # Reference Table Module
//!
//! Holds the reference pitch of every note the tuner can match against, plus
//! the note lists of each supported instrument. The table is loaded once from
//! a JSON file and never mutated afterwards, so it can be shared between
//! threads behind an `Arc` without any locking.
//!
//! ## File format
//! ```json
//! {
//!   "notes": { "A4": 440.0, "C4": 261.63 },
//!   "instruments": { "guitar": ["E2", "A2", "D3", "G3", "B3", "E4"] }
//! }
//! ```
//! Both sections are required; either may be empty.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::error::{Result, TunerError};

/// Why a reference document could not be turned into a table.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// Not JSON, or a required section is missing or mistyped.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A note whose reference pitch is zero, negative or not finite.
    #[error("note {note} has non-positive frequency {frequency}")]
    NonPositiveFrequency { note: String, frequency: f32 },
}

/// A single note with its reference frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceNote {
    /// Note identifier (e.g., "A4", "C#3")
    pub name: String,
    /// Frequency in Hz, always positive
    pub frequency: f32,
}

/// On-disk layout. The Spanish keys are accepted for older data files.
#[derive(Debug, Deserialize)]
struct ReferenceFile {
    #[serde(alias = "notas")]
    notes: BTreeMap<String, f32>,
    #[serde(alias = "instrumentos")]
    instruments: BTreeMap<String, Vec<String>>,
}

/// Immutable note and instrument lookup tables.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    // Sorted by (frequency, name) so nearest-note lookups are deterministic.
    notes: Vec<ReferenceNote>,
    by_name: BTreeMap<String, f32>,
    // Keys are lowercase.
    instruments: BTreeMap<String, Vec<String>>,
}

impl ReferenceTable {
    /// A table with no notes and no instruments.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the table from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| TunerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|e| TunerError::ConfigFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Loads the table, degrading to an empty one if the file is unusable.
    ///
    /// With an empty table every analysis reports no signal; the tuner keeps
    /// running so a broken data file never stops the process.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(table) => {
                log::info!(
                    "Loaded {} reference notes and {} instruments from {}",
                    table.len(),
                    table.instruments.len(),
                    path.display()
                );
                table
            }
            Err(e) => {
                log::error!("Reference data unavailable: {e}");
                log::warn!("Continuing with an empty reference table");
                Self::empty()
            }
        }
    }

    /// Parses a reference document.
    ///
    /// # Arguments
    /// * `content` - JSON text with a `notes` and an `instruments` section
    ///
    /// # Returns
    /// The table, or the reason the document is malformed. Instrument names
    /// are lowercased so lookups ignore case.
    pub fn from_json(content: &str) -> std::result::Result<Self, ReferenceError> {
        let file: ReferenceFile = serde_json::from_str(content)?;

        if let Some((note, &frequency)) = file
            .notes
            .iter()
            .find(|(_, f)| !(f.is_finite() && **f > 0.0))
        {
            return Err(ReferenceError::NonPositiveFrequency {
                note: note.clone(),
                frequency,
            });
        }

        let mut table = Self::from_notes(file.notes);
        table.instruments = file
            .instruments
            .into_iter()
            .map(|(name, notes)| (name.to_lowercase(), notes))
            .collect();
        Ok(table)
    }

    /// Builds a table from (name, frequency) pairs, skipping non-positive ones.
    pub fn from_notes<I, S>(notes: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        let mut notes: Vec<ReferenceNote> = notes
            .into_iter()
            .map(|(name, frequency)| ReferenceNote {
                name: name.into(),
                frequency,
            })
            .filter(|n| n.frequency.is_finite() && n.frequency > 0.0)
            .collect();
        notes.sort_by(|a, b| {
            a.frequency
                .total_cmp(&b.frequency)
                .then_with(|| a.name.cmp(&b.name))
        });
        let by_name = notes
            .iter()
            .map(|n| (n.name.clone(), n.frequency))
            .collect();

        Self {
            notes,
            by_name,
            instruments: BTreeMap::new(),
        }
    }

    /// Exact lookup of a note's reference frequency.
    pub fn frequency_of(&self, note: &str) -> Option<f32> {
        self.by_name.get(note).copied()
    }

    /// The notes of an instrument, matched case-insensitively.
    ///
    /// Unknown instruments yield an empty slice.
    pub fn notes_for_instrument(&self, instrument: &str) -> &[String] {
        self.instruments
            .get(&instrument.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Names of all instruments, sorted.
    pub fn instrument_names(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(String::as_str)
    }

    /// A sub-table holding only the named notes; unknown names are ignored.
    pub fn restricted_to(&self, names: &[String]) -> Self {
        let mut table = Self::from_notes(
            names
                .iter()
                .filter_map(|name| self.frequency_of(name).map(|f| (name.clone(), f))),
        );
        table.instruments = self.instruments.clone();
        table
    }

    /// Finds the note whose reference frequency is closest to `freq`.
    ///
    /// Returns `None` for an empty table or a frequency that is not positive.
    /// When two notes are equally close the lower one wins.
    pub fn nearest(&self, freq: f32) -> Option<&ReferenceNote> {
        if !(freq.is_finite() && freq > 0.0) || self.notes.is_empty() {
            return None;
        }

        let upper = self.notes.partition_point(|n| n.frequency < freq);
        if upper == 0 {
            return self.notes.first();
        }
        if upper == self.notes.len() {
            return Some(self.first_at(upper - 1));
        }

        let below = self.first_at(upper - 1);
        let above = &self.notes[upper];
        if (freq - below.frequency).abs() <= (above.frequency - freq).abs() {
            Some(below)
        } else {
            Some(above)
        }
    }

    /// First note sharing the frequency of `notes[index]`.
    fn first_at(&self, index: usize) -> &ReferenceNote {
        let freq = self.notes[index].frequency;
        let start = self.notes.partition_point(|n| n.frequency < freq);
        &self.notes[start]
    }

    /// All notes in ascending frequency order.
    pub fn notes(&self) -> &[ReferenceNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
