//! Response parsing and track merging.
//!
//! The generative service returns loosely structured JSON. Parsing is
//! deliberately lenient: one bad note drops that note, a bad instrument
//! entry drops that entry, and an unparsable response degrades to zero new
//! tracks for the unit. Nothing here aborts the surrounding request.

use midi_score::{MidiDocument, Note, Track};

pub const DEFAULT_TRACK_NAME: &str = "AI Generated";
const DEFAULT_NOTE_DURATION: f64 = 0.5;
const DEFAULT_NOTE_VELOCITY: f64 = 0.8;

/// Parse a generative response into tracks.
///
/// Expected shape:
/// `{ "instruments": [ { "name", "notes": [ {midi, time, duration, velocity} ] } ] }`.
/// A note is admitted only when `midi` (0-127) and `time` (>= 0) are
/// present and numeric; `duration` and `velocity` fall back to defaults
/// when missing or invalid.
pub fn parse_generated_tracks(text: &str) -> Vec<Track> {
    let cleaned = strip_code_fences(text);

    let value: serde_json::Value = match serde_json::from_str(cleaned) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "generative response was not valid JSON, no tracks produced");
            return Vec::new();
        }
    };

    let Some(instruments) = value.get("instruments").and_then(|v| v.as_array()) else {
        tracing::warn!("generative response has no instruments array, no tracks produced");
        return Vec::new();
    };

    let mut tracks = Vec::new();

    for entry in instruments {
        let name = entry
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_TRACK_NAME);
        let mut track = Track::new(name, name);

        let notes = entry
            .get("notes")
            .and_then(|v| v.as_array())
            .map(|v| v.as_slice())
            .unwrap_or_default();

        let mut dropped = 0usize;
        for raw in notes {
            match parse_note(raw) {
                Some(note) => track.push_note(note),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            tracing::warn!(
                track = %track.name,
                dropped,
                kept = track.notes.len(),
                "dropped invalid notes from generated track"
            );
        }

        tracks.push(track);
    }

    tracks
}

fn parse_note(raw: &serde_json::Value) -> Option<Note> {
    let midi = raw.get("midi")?.as_f64()?;
    let time = raw.get("time")?.as_f64()?;

    if !(0.0..=127.0).contains(&midi) || time < 0.0 {
        return None;
    }

    let duration = raw
        .get("duration")
        .and_then(|v| v.as_f64())
        .filter(|d| *d > 0.0)
        .unwrap_or(DEFAULT_NOTE_DURATION);

    let velocity = raw
        .get("velocity")
        .and_then(|v| v.as_f64())
        .filter(|v| (0.0..=1.0).contains(v))
        .unwrap_or(DEFAULT_NOTE_VELOCITY);

    Some(Note {
        pitch: midi.round() as u8,
        start: time,
        duration,
        velocity,
    })
}

/// Append generated tracks to the output document, shifting every note by
/// the originating unit's start time so sections land on the shared
/// timeline.
pub fn merge_tracks(doc: &mut MidiDocument, tracks: Vec<Track>, offset: f64) {
    for mut track in tracks {
        for note in &mut track.notes {
            note.start += offset;
        }
        doc.tracks.push(track);
    }
}

/// Strip a surrounding markdown code fence, which generative services
/// like to wrap JSON in even when asked not to.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // skip the info string ("json") on the opening fence line
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn one_bad_note_does_not_poison_the_track() {
        let mut notes: Vec<String> = (0..9)
            .map(|i| format!(r#"{{"midi": 60, "time": {}.0, "duration": 0.5, "velocity": 0.8}}"#, i))
            .collect();
        notes.push(r#"{"midi": "sixty", "time": 9.0}"#.to_string());
        let text = format!(
            r#"{{"instruments": [{{"name": "Bass", "notes": [{}]}}]}}"#,
            notes.join(",")
        );

        let tracks = parse_generated_tracks(&text);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].notes.len(), 9);
    }

    #[test]
    fn malformed_response_degrades_to_no_tracks() {
        assert!(parse_generated_tracks("this is not json").is_empty());
        assert!(parse_generated_tracks(r#"{"tracks": []}"#).is_empty());
    }

    #[test]
    fn missing_name_defaults() {
        let tracks = parse_generated_tracks(
            r#"{"instruments": [{"notes": [{"midi": 60, "time": 0.0}]}]}"#,
        );
        assert_eq!(tracks[0].name, DEFAULT_TRACK_NAME);
    }

    #[test]
    fn out_of_range_pitch_is_dropped_not_clamped() {
        let tracks = parse_generated_tracks(
            r#"{"instruments": [{"name": "X", "notes": [
                {"midi": 200, "time": 0.0},
                {"midi": -4, "time": 0.0},
                {"midi": 127, "time": 0.0}
            ]}]}"#,
        );
        assert_eq!(tracks[0].notes.len(), 1);
        assert_eq!(tracks[0].notes[0].pitch, 127);
    }

    #[test]
    fn invalid_duration_and_velocity_get_defaults() {
        let tracks = parse_generated_tracks(
            r#"{"instruments": [{"name": "X", "notes": [
                {"midi": 60, "time": 1.0, "duration": -2.0, "velocity": 3.5}
            ]}]}"#,
        );
        let note = &tracks[0].notes[0];
        assert_eq!(note.duration, 0.5);
        assert_eq!(note.velocity, 0.8);
    }

    #[test]
    fn merge_offsets_into_section_position() {
        let tracks = parse_generated_tracks(
            r#"{"instruments": [{"name": "Bass", "notes": [{"midi": 40, "time": 2.0}]}]}"#,
        );

        let mut doc = MidiDocument::new();
        merge_tracks(&mut doc, tracks, 30.0);

        assert_eq!(doc.tracks.len(), 1);
        assert!((doc.tracks[0].notes[0].start - 32.0).abs() < 1e-9);
    }

    #[test]
    fn fenced_json_is_accepted() {
        let text = "```json\n{\"instruments\": [{\"name\": \"Pad\", \"notes\": [{\"midi\": 72, \"time\": 0.0}]}]}\n```";
        let tracks = parse_generated_tracks(text);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].notes.len(), 1);
    }
}
