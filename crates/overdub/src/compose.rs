//! Composition orchestrator.
//!
//! Drives the whole pipeline for one request: analyze the source, decide
//! whole-piece vs. per-section processing, and for each unit extract,
//! summarize, prompt, and merge. Units run strictly sequentially with one
//! generative call in flight, and results merge in order, so identical
//! inputs produce identical output documents.

use crate::client::Composer;
use crate::merge::{merge_tracks, parse_generated_tracks};
use crate::prompt::{build_user_prompt, SYSTEM_PROMPT};
use crate::request::{CompositionRequest, InstrumentMode, SectionSpec};
use crate::Result;
use midi_score::{
    analyze, extract_range, parse_time_string, summarize, MidiDocument, DEFAULT_NOTE_SAMPLE,
};

/// Where a composition currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposePhase {
    Idle,
    Analyzing,
    Sectioned,
    WholePiece,
    Merging,
    Done,
    Failed,
}

impl ComposePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComposePhase::Idle => "idle",
            ComposePhase::Analyzing => "analyzing",
            ComposePhase::Sectioned => "sectioned",
            ComposePhase::WholePiece => "whole_piece",
            ComposePhase::Merging => "merging",
            ComposePhase::Done => "done",
            ComposePhase::Failed => "failed",
        }
    }
}

/// One work item: a section, or the whole piece.
struct Unit {
    label: String,
    start: f64,
    end: f64,
    instruments: Vec<String>,
}

/// Resolve the effective instrument set for a section.
///
/// An empty result means the unit is skipped with no generative call.
pub fn resolve_instruments(section: &SectionSpec, requested: &[String]) -> Vec<String> {
    match section.instrument_mode {
        InstrumentMode::All => requested.to_vec(),
        InstrumentMode::None => Vec::new(),
        InstrumentMode::Manual => section.instruments.clone(),
    }
}

pub struct Orchestrator {
    composer: Box<dyn Composer>,
    phase: ComposePhase,
}

impl Orchestrator {
    pub fn new(composer: Box<dyn Composer>) -> Self {
        Self {
            composer,
            phase: ComposePhase::Idle,
        }
    }

    pub fn phase(&self) -> ComposePhase {
        self.phase
    }

    /// Run one composition request to completion.
    ///
    /// Returns the serialized augmented document. On a fatal error no
    /// output bytes are produced and the orchestrator lands in `Failed`.
    pub async fn run(
        &mut self,
        source_bytes: &[u8],
        request: &CompositionRequest,
    ) -> Result<Vec<u8>> {
        let result = self.run_inner(source_bytes, request).await;
        if result.is_err() {
            self.phase = ComposePhase::Failed;
        }
        result
    }

    async fn run_inner(
        &mut self,
        source_bytes: &[u8],
        request: &CompositionRequest,
    ) -> Result<Vec<u8>> {
        request.validate()?;

        self.phase = ComposePhase::Analyzing;
        let source = MidiDocument::parse(source_bytes)?;
        let analysis = analyze(&source);
        tracing::info!(
            duration_seconds = analysis.duration_seconds,
            tracks = analysis.track_count,
            key = %analysis.key_signature,
            "analyzed source document"
        );

        let sectioned = request.sections.iter().any(SectionSpec::is_time_bounded);
        self.phase = if sectioned {
            ComposePhase::Sectioned
        } else {
            ComposePhase::WholePiece
        };

        let units: Vec<Unit> = if sectioned {
            request
                .sections
                .iter()
                .map(|section| Unit {
                    label: section.display_label().to_string(),
                    start: parse_time_string(&section.start),
                    end: if section.end.trim().is_empty() {
                        source.total_duration()
                    } else {
                        parse_time_string(&section.end)
                    },
                    instruments: resolve_instruments(section, &request.instruments),
                })
                .collect()
        } else {
            vec![Unit {
                label: "Full Composition".to_string(),
                start: 0.0,
                end: source.total_duration(),
                instruments: request.instruments.clone(),
            }]
        };

        let mut output = source.clone();

        for unit in &units {
            if unit.instruments.is_empty() {
                tracing::info!(unit = %unit.label, "no instruments selected, skipping unit");
                continue;
            }

            let section_doc = extract_range(&source, unit.start, unit.end);
            if section_doc.note_count() == 0 {
                tracing::info!(unit = %unit.label, "section window has no notes, skipping unit");
                continue;
            }

            let summary = summarize(&section_doc, DEFAULT_NOTE_SAMPLE);
            let user_prompt = build_user_prompt(
                &analysis,
                &summary,
                request.genre.as_deref(),
                request.subgenre.as_deref(),
                &unit.instruments,
                &unit.label,
            );

            tracing::info!(
                unit = %unit.label,
                instruments = ?unit.instruments,
                source_notes = section_doc.note_count(),
                "requesting generated parts"
            );

            let response = match self.composer.generate(SYSTEM_PROMPT, &user_prompt).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(unit = %unit.label, error = %e, "generative call failed");
                    return Err(e);
                }
            };

            let tracks = parse_generated_tracks(&response);
            if tracks.is_empty() {
                tracing::warn!(unit = %unit.label, "unit produced no usable tracks");
                continue;
            }

            let note_total: usize = tracks.iter().map(|t| t.notes.len()).sum();
            tracing::info!(
                unit = %unit.label,
                new_tracks = tracks.len(),
                new_notes = note_total,
                "merging generated tracks"
            );
            merge_tracks(&mut output, tracks, unit.start);
        }

        self.phase = ComposePhase::Merging;
        let bytes = output.to_bytes();
        self.phase = ComposePhase::Done;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn section(mode: InstrumentMode, instruments: &[&str]) -> SectionSpec {
        SectionSpec {
            id: "s".to_string(),
            label: "Verse".to_string(),
            start: String::new(),
            end: String::new(),
            instrument_mode: mode,
            instruments: instruments.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn requested() -> Vec<String> {
        vec!["bass".to_string(), "drums".to_string()]
    }

    #[test]
    fn all_mode_takes_the_request_list() {
        let resolved = resolve_instruments(&section(InstrumentMode::All, &[]), &requested());
        assert_eq!(resolved, requested());
    }

    #[test]
    fn none_mode_is_empty() {
        let resolved = resolve_instruments(
            &section(InstrumentMode::None, &["bass"]),
            &requested(),
        );
        assert!(resolved.is_empty());
    }

    #[test]
    fn manual_mode_takes_the_section_list() {
        let resolved = resolve_instruments(
            &section(InstrumentMode::Manual, &["bass"]),
            &requested(),
        );
        assert_eq!(resolved, vec!["bass".to_string()]);
    }

    #[test]
    fn manual_with_empty_list_is_a_skip() {
        let resolved = resolve_instruments(&section(InstrumentMode::Manual, &[]), &requested());
        assert!(resolved.is_empty());
    }

    #[test]
    fn phase_names() {
        assert_eq!(ComposePhase::Idle.as_str(), "idle");
        assert_eq!(ComposePhase::WholePiece.as_str(), "whole_piece");
        assert_eq!(ComposePhase::Failed.as_str(), "failed");
    }
}
