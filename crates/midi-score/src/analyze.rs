use crate::document::MidiDocument;
use serde::{Deserialize, Serialize};

/// Lowest and highest pitch seen in a document.
///
/// Initialized to the legal range's far bounds, so an empty document
/// reports the degenerate range {127, 0} rather than invented pitches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRange {
    pub lowest: u8,
    pub highest: u8,
}

/// Compact musical summary of a document. Derived, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicalAnalysis {
    pub duration_seconds: f64,
    pub tempo_bpm: f64,
    pub time_signature: String,
    pub key_signature: String,
    pub track_count: usize,
    pub note_range: NoteRange,
}

/// Analyze a document in a single pass over every note.
pub fn analyze(doc: &MidiDocument) -> MusicalAnalysis {
    let mut lowest: u8 = 127;
    let mut highest: u8 = 0;

    for track in &doc.tracks {
        for note in &track.notes {
            lowest = lowest.min(note.pitch);
            highest = highest.max(note.pitch);
        }
    }

    MusicalAnalysis {
        duration_seconds: doc.total_duration(),
        tempo_bpm: doc.tempo_bpm,
        time_signature: doc.time_signature_string(),
        key_signature: doc.key_signature.clone(),
        track_count: doc.tracks.len(),
        note_range: NoteRange { lowest, highest },
    }
}
