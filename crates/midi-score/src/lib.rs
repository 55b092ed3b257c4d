pub mod analyze;
pub mod document;
pub mod extract;
pub mod gm;
pub mod summary;
pub mod writer;

pub use analyze::{analyze, MusicalAnalysis, NoteRange};
pub use document::{MidiDocument, Note, Track};
pub use extract::{extract_range, parse_time_string};
pub use summary::{pitch_name, summarize, DEFAULT_NOTE_SAMPLE};

/// Errors from MIDI document operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
