//! Overdub core: composition orchestration over a source MIDI document.
//!
//! Library exposing the pipeline modules for testing and reuse.

pub mod client;
pub mod compose;
pub mod config;
pub mod merge;
pub mod prompt;
pub mod request;

pub use client::{Composer, HttpComposer};
pub use compose::{ComposePhase, Orchestrator};
pub use config::Config;
pub use request::{CompositionRequest, InstrumentMode, SectionSpec};

/// Errors that abort a composition request.
///
/// Recoverable conditions (malformed generative output, empty sections)
/// are absorbed where they are detected and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error(transparent)]
    Score(#[from] midi_score::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("generative service error: {0}")]
    ExternalService(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, ComposeError>;
