//! Bounded textual rendering of a document for prompting.

use crate::document::MidiDocument;

/// Default cap on the number of notes listed per track.
pub const DEFAULT_NOTE_SAMPLE: usize = 100;

/// Convert a MIDI pitch number to a note name like "C4".
pub fn pitch_name(pitch: u8) -> String {
    const NOTE_NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = (pitch as i32 / 12) - 1;
    format!("{}{}", NOTE_NAMES[(pitch % 12) as usize], octave)
}

/// Render a document as a bounded, human-readable text block.
///
/// Lists total duration and track count, then each non-empty track with
/// its name, instrument, note count, and up to `cap` notes. Deterministic
/// for a given document and cap.
pub fn summarize(doc: &MidiDocument, cap: usize) -> String {
    let mut out = format!(
        "Duration: {:.2}s, tempo {:.0} BPM, {} in {}, {} tracks\n",
        doc.total_duration(),
        doc.tempo_bpm,
        doc.key_signature,
        doc.time_signature_string(),
        doc.tracks.len(),
    );

    for track in &doc.tracks {
        if track.notes.is_empty() {
            continue;
        }

        out.push_str(&format!(
            "\nTrack \"{}\" ({}): {} notes\n",
            track.display_name(),
            track.instrument,
            track.notes.len(),
        ));

        for note in track.notes.iter().take(cap) {
            out.push_str(&format!(
                "  {} at {:.2}s for {:.2}s vel {:.2}\n",
                pitch_name(note.pitch),
                note.start,
                note.duration,
                note.velocity,
            ));
        }

        if track.notes.len() > cap {
            out.push_str(&format!(
                "  ... and {} more notes\n",
                track.notes.len() - cap
            ));
        }
    }

    out
}
