//! Time-range extraction: slice a document into a re-zeroed sub-document.

use crate::document::MidiDocument;

/// Parse a free-form time string into seconds.
///
/// With a colon, the left side is whole minutes and the right side seconds
/// ("1:30" is 90.0). Without one, the whole string parses as seconds.
/// Unparsable fragments contribute 0.
pub fn parse_time_string(raw: &str) -> f64 {
    let raw = raw.trim();
    match raw.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes = minutes.trim().parse::<f64>().unwrap_or(0.0);
            let seconds = seconds.trim().parse::<f64>().unwrap_or(0.0);
            minutes * 60.0 + seconds
        }
        None => raw.parse::<f64>().unwrap_or(0.0),
    }
}

/// Extract the window [start, end) from a document.
///
/// The result keeps every track's name and instrument, contains only the
/// notes whose onset falls inside the window, and re-zeroes each copied
/// note by subtracting `start`. The header (tempo, meter, key, PPQ) is
/// copied so downstream summarization reflects the original feel. When
/// `start >= end` every track comes back empty; callers skip empty
/// sections before prompting.
pub fn extract_range(doc: &MidiDocument, start: f64, end: f64) -> MidiDocument {
    let mut section = MidiDocument {
        tempo_bpm: doc.tempo_bpm,
        time_signature: doc.time_signature,
        key_signature: doc.key_signature.clone(),
        ppq: doc.ppq,
        tracks: Vec::new(),
    };

    for track in &doc.tracks {
        let out = section.add_track(track.name.clone(), track.instrument.clone());
        for note in &track.notes {
            if note.start >= start && note.start < end {
                let mut copied = note.clone();
                copied.start -= start;
                out.push_note(copied);
            }
        }
    }

    section
}
