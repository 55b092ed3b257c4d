use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_TEMPO_BPM: f64 = 120.0;
pub const DEFAULT_PPQ: u16 = 480;
pub const DEFAULT_KEY: &str = "C";

/// A single note with absolute timing in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI pitch, 0-127.
    pub pitch: u8,
    /// Onset in seconds from the start of the document.
    pub start: f64,
    /// Length in seconds, always > 0.
    pub duration: f64,
    /// Normalized velocity, 0.0-1.0.
    pub velocity: f64,
}

impl Note {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A named channel of notes, conventionally one per instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub instrument: String,
    /// Insertion order is preserved; not required to be time-sorted.
    pub notes: Vec<Note>,
}

impl Track {
    pub fn new(name: impl Into<String>, instrument: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instrument: instrument.into(),
            notes: Vec::new(),
        }
    }

    pub fn push_note(&mut self, note: Note) {
        self.notes.push(note);
    }

    /// Track name for display; empty names render as "Unnamed".
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Unnamed"
        } else {
            &self.name
        }
    }
}

/// In-memory MIDI document: tracks plus the header-level musical context.
///
/// Tempo, time signature, and key are the first declared values in the
/// source file (or defaults), matching how the document is written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiDocument {
    pub tempo_bpm: f64,
    pub time_signature: (u8, u8),
    pub key_signature: String,
    pub ppq: u16,
    pub tracks: Vec<Track>,
}

impl Default for MidiDocument {
    fn default() -> Self {
        Self {
            tempo_bpm: DEFAULT_TEMPO_BPM,
            time_signature: (4, 4),
            key_signature: DEFAULT_KEY.to_string(),
            ppq: DEFAULT_PPQ,
            tracks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TempoChange {
    tick: u64,
    bpm: f64,
}

impl MidiDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a Standard MIDI File byte stream into a document.
    ///
    /// Note-on/note-off events are paired per (channel, pitch) with a
    /// pending stack so overlapping repeats of the same pitch resolve in
    /// LIFO order. Tick positions are converted to seconds through the
    /// file's full tempo map, then the document keeps the first declared
    /// tempo as its header tempo. Unterminated notes are closed at their
    /// track's final tick.
    pub fn parse(bytes: &[u8]) -> crate::Result<Self> {
        let smf = Smf::parse(bytes).map_err(|e| crate::Error::Parse(e.to_string()))?;

        let ppq = match smf.header.timing {
            midly::Timing::Metrical(ticks) => ticks.as_int(),
            midly::Timing::Timecode(_, _) => DEFAULT_PPQ,
        };

        // First pass: tempo map and first-declared header metas.
        let mut tempo_changes: Vec<TempoChange> = Vec::new();
        let mut time_signature: Option<(u8, u8)> = None;
        let mut key_signature: Option<String> = None;

        for track in &smf.tracks {
            let mut current_tick: u64 = 0;
            for event in track {
                current_tick += event.delta.as_int() as u64;
                match event.kind {
                    TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                        tempo_changes.push(TempoChange {
                            tick: current_tick,
                            bpm: 60_000_000.0 / tempo.as_int() as f64,
                        });
                    }
                    TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                        if time_signature.is_none() {
                            time_signature = Some((num, 1u8 << denom_pow));
                        }
                    }
                    TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)) => {
                        if key_signature.is_none() {
                            key_signature = Some(key_name(sharps, minor));
                        }
                    }
                    _ => {}
                }
            }
        }

        tempo_changes.sort_by_key(|t| t.tick);
        tempo_changes.dedup_by(|a, b| a.tick == b.tick);

        let tempo_bpm = tempo_changes
            .first()
            .map(|t| t.bpm)
            .unwrap_or(DEFAULT_TEMPO_BPM);

        // Second pass: extract notes per track, converting ticks to seconds.
        let mut tracks = Vec::new();

        for track in &smf.tracks {
            let mut current_tick: u64 = 0;
            let mut name: Option<String> = None;
            let mut instrument: Option<String> = None;
            // (channel, pitch) -> stack of (onset_tick, velocity)
            let mut pending: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();
            let mut raw_notes: Vec<(u64, u64, u8, u8)> = Vec::new();

            for event in track {
                current_tick += event.delta.as_int() as u64;

                match event.kind {
                    TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
                        if name.is_none() {
                            name = String::from_utf8(bytes.to_vec()).ok();
                        }
                    }
                    TrackEventKind::Meta(MetaMessage::InstrumentName(bytes)) => {
                        if instrument.is_none() {
                            instrument = String::from_utf8(bytes.to_vec()).ok();
                        }
                    }
                    TrackEventKind::Midi { channel, message } => {
                        let ch = channel.as_int();
                        match message {
                            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                                pending
                                    .entry((ch, key.as_int()))
                                    .or_default()
                                    .push((current_tick, vel.as_int()));
                            }
                            // vel=0 NoteOn is NoteOff
                            MidiMessage::NoteOff { key, .. }
                            | MidiMessage::NoteOn { key, .. } => {
                                if let Some(stack) = pending.get_mut(&(ch, key.as_int())) {
                                    if let Some((onset, velocity)) = stack.pop() {
                                        raw_notes.push((
                                            onset,
                                            current_tick,
                                            key.as_int(),
                                            velocity,
                                        ));
                                    }
                                }
                            }
                            MidiMessage::ProgramChange { program } => {
                                if instrument.is_none() {
                                    instrument = Some(
                                        crate::gm::program_family(program.as_int()).to_string(),
                                    );
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }

            // Close any unclosed notes at the track's final tick.
            for ((_, pitch), stack) in &pending {
                for &(onset, velocity) in stack {
                    raw_notes.push((onset, current_tick, *pitch, velocity));
                }
            }

            raw_notes.sort_by(|a, b| a.0.cmp(&b.0).then(a.2.cmp(&b.2)));

            let notes: Vec<Note> = raw_notes
                .into_iter()
                .map(|(onset, offset, pitch, velocity)| {
                    let start = ticks_to_seconds(onset, ppq, &tempo_changes);
                    let end = ticks_to_seconds(offset, ppq, &tempo_changes);
                    let duration = if end > start { end - start } else { 0.5 };
                    Note {
                        pitch,
                        start,
                        duration,
                        velocity: velocity as f64 / 127.0,
                    }
                })
                .collect();

            // Pure meta tracks (tempo maps and the like) carry no musical
            // identity worth keeping in the document.
            if notes.is_empty() && name.is_none() && instrument.is_none() {
                continue;
            }

            tracks.push(Track {
                name: name.unwrap_or_default(),
                instrument: instrument.unwrap_or_else(|| "Unknown".to_string()),
                notes,
            });
        }

        Ok(Self {
            tempo_bpm,
            time_signature: time_signature.unwrap_or((4, 4)),
            key_signature: key_signature.unwrap_or_else(|| DEFAULT_KEY.to_string()),
            ppq,
            tracks,
        })
    }

    /// Add a new empty track and return a handle to it.
    pub fn add_track(
        &mut self,
        name: impl Into<String>,
        instrument: impl Into<String>,
    ) -> &mut Track {
        self.tracks.push(Track::new(name, instrument));
        self.tracks.last_mut().expect("track just pushed")
    }

    /// Total duration in seconds: the latest note end across all tracks.
    pub fn total_duration(&self) -> f64 {
        self.tracks
            .iter()
            .flat_map(|t| t.notes.iter())
            .map(Note::end)
            .fold(0.0, f64::max)
    }

    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.notes.len()).sum()
    }

    pub fn time_signature_string(&self) -> String {
        format!("{}/{}", self.time_signature.0, self.time_signature.1)
    }
}

/// Convert a tick position to seconds, walking the tempo map.
fn ticks_to_seconds(tick: u64, ppq: u16, tempo_changes: &[TempoChange]) -> f64 {
    if tempo_changes.is_empty() {
        let seconds_per_tick = 60.0 / (DEFAULT_TEMPO_BPM * ppq as f64);
        return tick as f64 * seconds_per_tick;
    }

    let mut seconds = 0.0;
    let mut last_tick = 0u64;
    let mut current_bpm = tempo_changes[0].bpm;

    for change in tempo_changes {
        if change.tick >= tick {
            break;
        }
        if change.tick > last_tick {
            let delta = change.tick - last_tick;
            seconds += delta as f64 * 60.0 / (current_bpm * ppq as f64);
        }
        last_tick = change.tick;
        current_bpm = change.bpm;
    }

    if tick > last_tick {
        let delta = tick - last_tick;
        seconds += delta as f64 * 60.0 / (current_bpm * ppq as f64);
    }

    seconds
}

/// Key signature tables indexed by accidental count, -7 flats to +7 sharps.
const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_KEYS: [&str; 15] = [
    "Abm", "Ebm", "Bbm", "Fm", "Cm", "Gm", "Dm", "Am", "Em", "Bm", "F#m", "C#m", "G#m", "D#m",
    "A#m",
];

/// Render a MIDI key signature meta (accidental count, minor flag) as a name.
pub fn key_name(sharps: i8, minor: bool) -> String {
    let idx = (sharps.clamp(-7, 7) + 7) as usize;
    if minor {
        MINOR_KEYS[idx].to_string()
    } else {
        MAJOR_KEYS[idx].to_string()
    }
}

/// Reverse of [`key_name`]: accidental count and minor flag for a key name.
/// Unknown names fall back to C major so writing is total.
pub fn key_accidentals(name: &str) -> (i8, bool) {
    if let Some(pos) = MAJOR_KEYS.iter().position(|&k| k == name) {
        return (pos as i8 - 7, false);
    }
    if let Some(pos) = MINOR_KEYS.iter().position(|&k| k == name) {
        return (pos as i8 - 7, true);
    }
    (0, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn make_test_midi() -> Vec<u8> {
        // Format 1, two tracks: tempo/meter metas, then a C major arpeggio.
        let mut buf = Vec::new();

        buf.extend_from_slice(b"MThd");
        buf.extend_from_slice(&6u32.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&480u16.to_be_bytes());

        // Track 0: tempo 120, 4/4, key C
        let mut track0 = Vec::new();
        track0.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
        track0.extend_from_slice(&[0x00, 0xFF, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08]);
        track0.extend_from_slice(&[0x00, 0xFF, 0x59, 0x02, 0x00, 0x00]);
        track0.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track0.len() as u32).to_be_bytes());
        buf.extend_from_slice(&track0);

        // Track 1: named melody, C4 E4 G4, one beat each
        let mut track1 = Vec::new();
        track1.extend_from_slice(&[0x00, 0xFF, 0x03, 0x04]);
        track1.extend_from_slice(b"Lead");
        track1.extend_from_slice(&[0x00, 0xC0, 0x00]); // program 0: piano
        track1.extend_from_slice(&[0x00, 0x90, 60, 100]);
        track1.extend_from_slice(&[0x83, 0x60, 0x80, 60, 0]);
        track1.extend_from_slice(&[0x00, 0x90, 64, 100]);
        track1.extend_from_slice(&[0x83, 0x60, 0x80, 64, 0]);
        track1.extend_from_slice(&[0x00, 0x90, 67, 100]);
        track1.extend_from_slice(&[0x83, 0x60, 0x80, 67, 0]);
        track1.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track1.len() as u32).to_be_bytes());
        buf.extend_from_slice(&track1);

        buf
    }

    #[test]
    fn parse_reads_header_metas() {
        let doc = MidiDocument::parse(&make_test_midi()).unwrap();

        assert_eq!(doc.tempo_bpm.round(), 120.0);
        assert_eq!(doc.time_signature, (4, 4));
        assert_eq!(doc.key_signature, "C");
        assert_eq!(doc.ppq, 480);
    }

    #[test]
    fn parse_extracts_notes_in_seconds() {
        let doc = MidiDocument::parse(&make_test_midi()).unwrap();

        // Meta-only track 0 is dropped; the melody track survives.
        assert_eq!(doc.tracks.len(), 1);
        let track = &doc.tracks[0];
        assert_eq!(track.name, "Lead");
        assert_eq!(track.instrument, "Piano");
        assert_eq!(track.notes.len(), 3);

        // One beat at 120 BPM is 0.5 seconds.
        assert_eq!(track.notes[0].pitch, 60);
        assert!((track.notes[0].start - 0.0).abs() < 1e-9);
        assert!((track.notes[0].duration - 0.5).abs() < 1e-9);
        assert!((track.notes[1].start - 0.5).abs() < 1e-9);
        assert!((track.notes[2].start - 1.0).abs() < 1e-9);
        assert!((track.notes[0].velocity - 100.0 / 127.0).abs() < 1e-9);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            MidiDocument::parse(b"not a midi file"),
            Err(crate::Error::Parse(_))
        ));
    }

    #[test]
    fn total_duration_is_latest_note_end() {
        let doc = MidiDocument::parse(&make_test_midi()).unwrap();
        assert!((doc.total_duration() - 1.5).abs() < 1e-9);

        assert_eq!(MidiDocument::new().total_duration(), 0.0);
    }

    #[test]
    fn tempo_map_conversion_spans_changes() {
        // 480 ticks at 120 BPM then 480 ticks at 60 BPM: 0.5s + 1.0s.
        let changes = vec![
            TempoChange { tick: 0, bpm: 120.0 },
            TempoChange { tick: 480, bpm: 60.0 },
        ];
        let seconds = ticks_to_seconds(960, 480, &changes);
        assert!((seconds - 1.5).abs() < 1e-9);
    }

    #[test]
    fn key_names_round_trip() {
        assert_eq!(key_name(0, false), "C");
        assert_eq!(key_name(2, false), "D");
        assert_eq!(key_name(-3, true), "Cm");
        assert_eq!(key_accidentals("D"), (2, false));
        assert_eq!(key_accidentals("Cm"), (-3, true));
        assert_eq!(key_accidentals("nonsense"), (0, false));
    }
}
