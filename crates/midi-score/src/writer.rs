//! Standard MIDI File serialization.
//!
//! Renders a document as a format-1 SMF: track 0 carries tempo, time
//! signature, and key signature; each document track becomes one MTrk with
//! name and instrument metas followed by note events.

use crate::document::{key_accidentals, MidiDocument, Track};

impl MidiDocument {
    /// Serialize the document to Standard MIDI File bytes.
    ///
    /// Seconds are quantized to ticks at the document's header tempo and
    /// PPQ. Note-offs sort before note-ons at the same tick so re-parsers
    /// never see overlapping same-pitch pairs out of order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut tracks: Vec<Vec<u8>> = Vec::new();
        tracks.push(self.build_meta_track());

        // Assign channels, skipping 9 (GM percussion).
        let mut channel_alloc = 0u8;
        for track in &self.tracks {
            let channel = channel_alloc.min(15);
            channel_alloc += 1;
            if channel_alloc == 9 {
                channel_alloc = 10;
            }

            tracks.push(self.build_note_track(track, channel));
        }

        build_midi_file(self.ppq, &tracks)
    }

    fn build_meta_track(&self) -> Vec<u8> {
        let mut track_data = Vec::new();

        let usec_per_beat = (60_000_000.0 / self.tempo_bpm).round() as u32;
        write_vlq(&mut track_data, 0);
        track_data.extend_from_slice(&[
            0xFF,
            0x51,
            0x03,
            (usec_per_beat >> 16) as u8,
            (usec_per_beat >> 8) as u8,
            usec_per_beat as u8,
        ]);

        let (num, denom) = self.time_signature;
        let denom_pow = (denom.max(1) as f64).log2() as u8;
        write_vlq(&mut track_data, 0);
        track_data.extend_from_slice(&[0xFF, 0x58, 0x04, num, denom_pow, 0x18, 0x08]);

        let (sharps, minor) = key_accidentals(&self.key_signature);
        write_vlq(&mut track_data, 0);
        track_data.extend_from_slice(&[0xFF, 0x59, 0x02, sharps as u8, minor as u8]);

        write_vlq(&mut track_data, 0);
        track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

        track_data
    }

    fn build_note_track(&self, track: &Track, channel: u8) -> Vec<u8> {
        let mut events: Vec<(u64, Vec<u8>)> = Vec::new();

        let mut name_event = vec![0xFF, 0x03];
        write_vlq(&mut name_event, track.name.len() as u32);
        name_event.extend_from_slice(track.name.as_bytes());
        events.push((0, name_event));

        let mut instrument_event = vec![0xFF, 0x04];
        write_vlq(&mut instrument_event, track.instrument.len() as u32);
        instrument_event.extend_from_slice(track.instrument.as_bytes());
        events.push((0, instrument_event));

        for note in &track.notes {
            let onset = self.seconds_to_ticks(note.start);
            let offset = self.seconds_to_ticks(note.end()).max(onset + 1);
            let velocity = ((note.velocity * 127.0).round() as i64).clamp(1, 127) as u8;

            events.push((onset, vec![0x90 | (channel & 0x0F), note.pitch, velocity]));
            events.push((offset, vec![0x80 | (channel & 0x0F), note.pitch, 0]));
        }

        // Sort by tick, note-offs before note-ons at the same tick.
        events.sort_by(|a, b| {
            a.0.cmp(&b.0).then_with(|| {
                let a_is_off = a.1.first().is_some_and(|b| b & 0xF0 == 0x80);
                let b_is_off = b.1.first().is_some_and(|b| b & 0xF0 == 0x80);
                b_is_off.cmp(&a_is_off)
            })
        });

        let mut track_data = Vec::new();
        let mut last_tick = 0u64;

        for (tick, data) in events {
            let delta = tick.saturating_sub(last_tick);
            write_vlq(&mut track_data, delta as u32);
            track_data.extend_from_slice(&data);
            last_tick = tick;
        }

        write_vlq(&mut track_data, 0);
        track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

        track_data
    }

    fn seconds_to_ticks(&self, seconds: f64) -> u64 {
        (seconds * self.tempo_bpm / 60.0 * self.ppq as f64).round() as u64
    }
}

/// Assemble a complete MIDI file from track data blobs.
fn build_midi_file(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes()); // format 1
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    for track_data in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(track_data);
    }

    buf
}

/// Write a variable-length quantity to a byte buffer.
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    if value == 0 {
        buf.push(0);
        return;
    }

    let mut bytes = Vec::new();
    bytes.push((value & 0x7F) as u8);
    value >>= 7;

    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }

    bytes.reverse();
    buf.extend_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Note;
    use midly::Smf;
    use pretty_assertions::assert_eq;

    fn make_document() -> MidiDocument {
        let mut doc = MidiDocument::new();
        let track = doc.add_track("Lead", "Piano");
        track.push_note(Note {
            pitch: 60,
            start: 0.0,
            duration: 0.5,
            velocity: 100.0 / 127.0,
        });
        track.push_note(Note {
            pitch: 64,
            start: 0.5,
            duration: 0.5,
            velocity: 100.0 / 127.0,
        });
        track.push_note(Note {
            pitch: 67,
            start: 1.0,
            duration: 1.0,
            velocity: 64.0 / 127.0,
        });
        doc
    }

    #[test]
    fn output_is_valid_format1() {
        let bytes = make_document().to_bytes();
        let smf = Smf::parse(&bytes).expect("generated MIDI should be valid");
        assert_eq!(smf.header.format, midly::Format::Parallel);
        assert_eq!(smf.tracks.len(), 2); // meta track + 1 note track
    }

    #[test]
    fn serialize_parse_round_trip() {
        let original = make_document();
        let reparsed = MidiDocument::parse(&original.to_bytes()).unwrap();

        assert!((reparsed.tempo_bpm - original.tempo_bpm).abs() < 1e-6);
        assert_eq!(reparsed.time_signature, original.time_signature);
        assert_eq!(reparsed.key_signature, original.key_signature);
        assert_eq!(reparsed.tracks.len(), original.tracks.len());

        let (a, b) = (&original.tracks[0], &reparsed.tracks[0]);
        assert_eq!(b.name, a.name);
        assert_eq!(b.instrument, a.instrument);
        assert_eq!(b.notes.len(), a.notes.len());
        for (x, y) in a.notes.iter().zip(&b.notes) {
            assert_eq!(y.pitch, x.pitch);
            assert!((y.start - x.start).abs() < 1e-6);
            assert!((y.duration - x.duration).abs() < 1e-6);
            assert!((y.velocity - x.velocity).abs() < 1e-6);
        }
    }

    #[test]
    fn byte_level_round_trip_is_stable() {
        // serialize(parse(bytes)) preserves tempo, meter, and note data.
        let first = make_document().to_bytes();
        let doc = MidiDocument::parse(&first).unwrap();
        let second = doc.to_bytes();
        assert_eq!(second, first);
    }

    #[test]
    fn channel_allocation_skips_percussion() {
        let mut doc = MidiDocument::new();
        for i in 0..11 {
            let track = doc.add_track(format!("T{i}"), "Unknown");
            track.push_note(Note {
                pitch: 60,
                start: 0.0,
                duration: 0.5,
                velocity: 0.5,
            });
        }
        let bytes = doc.to_bytes();
        let smf = Smf::parse(&bytes).unwrap();

        let mut channels = Vec::new();
        for track in &smf.tracks[1..] {
            for event in track {
                if let midly::TrackEventKind::Midi { channel, .. } = event.kind {
                    let ch = channel.as_int();
                    if !channels.contains(&ch) {
                        channels.push(ch);
                    }
                }
            }
        }
        assert!(!channels.contains(&9));
    }

    #[test]
    fn empty_key_falls_back_to_c_major() {
        let mut doc = make_document();
        doc.key_signature = "H#minor".to_string(); // unknown name
        let reparsed = MidiDocument::parse(&doc.to_bytes()).unwrap();
        assert_eq!(reparsed.key_signature, "C");
    }

    #[test]
    fn vlq_encoding() {
        let mut buf = Vec::new();
        write_vlq(&mut buf, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        write_vlq(&mut buf, 127);
        assert_eq!(buf, vec![0x7F]);

        buf.clear();
        write_vlq(&mut buf, 128);
        assert_eq!(buf, vec![0x81, 0x00]);

        buf.clear();
        write_vlq(&mut buf, 480);
        assert_eq!(buf, vec![0x83, 0x60]);
    }
}
