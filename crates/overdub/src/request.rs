//! Composition request model: sections and instrument selection.

use crate::{ComposeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a section chooses its instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentMode {
    /// Use the request's full instrument list.
    All,
    /// Generate nothing for this section.
    None,
    /// Use the section's explicit instrument list.
    Manual,
}

impl Default for InstrumentMode {
    fn default() -> Self {
        InstrumentMode::All
    }
}

/// A named, optionally time-bounded portion of the piece.
///
/// Start and end are raw user strings ("M:SS" or bare seconds); an empty
/// end means "to the end of the piece".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSpec {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub instrument_mode: InstrumentMode,
    #[serde(default)]
    pub instruments: Vec<String>,
}

impl SectionSpec {
    /// Whether the section carries an explicit time window.
    pub fn is_time_bounded(&self) -> bool {
        !self.start.trim().is_empty() || !self.end.trim().is_empty()
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// One complete composition request. Created fresh per run, discarded
/// after the output document is serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionRequest {
    /// Path of the source MIDI document.
    pub source: PathBuf,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub subgenre: Option<String>,
    pub instruments: Vec<String>,
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
}

impl CompositionRequest {
    /// Validate cross-field consistency.
    ///
    /// A manual section may only name instruments present in the
    /// request-level instrument list; anything else is rejected here
    /// rather than silently passed through to the service.
    pub fn validate(&self) -> Result<()> {
        for section in &self.sections {
            if section.instrument_mode != InstrumentMode::Manual {
                continue;
            }
            for instrument in &section.instruments {
                if !self.instruments.contains(instrument) {
                    return Err(ComposeError::InvalidRequest(format!(
                        "section '{}' selects instrument '{}' which is not in the request's instrument list",
                        section.display_label(),
                        instrument,
                    )));
                }
            }
        }
        Ok(())
    }
}
