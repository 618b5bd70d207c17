use crate::error::{Result, TimelineError};
use crate::models::{Document, Event, EventKind, Meta, Track};
use midly::{Fps, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::Path;

/// Read and decode one MIDI file
pub fn read_document(path: &Path) -> Result<Document> {
    let bytes = std::fs::read(path).map_err(|e| TimelineError::UnreadableFragment {
        path: path.to_path_buf(),
        reason: format!("read failed: {}", e),
    })?;
    parse_document(&bytes).map_err(|reason| TimelineError::UnreadableFragment {
        path: path.to_path_buf(),
        reason,
    })
}

/// Decode SMF bytes into an owned Document
///
/// Only metrical (ticks-per-beat) timing is accepted; SMPTE timecode files
/// have no beat grid to align against.
pub fn parse_document(bytes: &[u8]) -> std::result::Result<Document, String> {
    let smf = Smf::parse(bytes).map_err(|e| format!("invalid MIDI: {}", e))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(fps, sub) => {
            return Err(format!(
                "timecode timing ({:?}, {} subframes) is not supported",
                fps, sub
            ))
        }
    };
    if ticks_per_beat == 0 {
        return Err("header declares zero ticks per beat".to_string());
    }

    let tracks = smf
        .tracks
        .iter()
        .map(|track| Track::from_events(track.iter().map(convert_event).collect()))
        .collect();

    Ok(Document::with_tracks(ticks_per_beat, tracks))
}

fn convert_event(event: &TrackEvent) -> Event {
    let kind = match event.kind {
        TrackEventKind::Midi { channel, message } => convert_message(channel.as_int(), message),
        TrackEventKind::SysEx(data) => EventKind::SysEx(data.to_vec()),
        TrackEventKind::Escape(data) => EventKind::Escape(data.to_vec()),
        TrackEventKind::Meta(meta) => EventKind::Meta(convert_meta(meta)),
    };
    Event::new(event.delta.as_int(), kind)
}

fn convert_message(channel: u8, message: MidiMessage) -> EventKind {
    match message {
        MidiMessage::NoteOn { key, vel } => EventKind::NoteOn {
            channel,
            key: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::NoteOff { key, vel } => EventKind::NoteOff {
            channel,
            key: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::ProgramChange { program } => EventKind::ProgramChange {
            channel,
            program: program.as_int(),
        },
        MidiMessage::Controller { controller, value } => EventKind::Controller {
            channel,
            controller: controller.as_int(),
            value: value.as_int(),
        },
        MidiMessage::PitchBend { bend } => EventKind::PitchBend {
            channel,
            bend: bend.0.as_int(),
        },
        MidiMessage::Aftertouch { key, vel } => EventKind::KeyPressure {
            channel,
            key: key.as_int(),
            pressure: vel.as_int(),
        },
        MidiMessage::ChannelAftertouch { vel } => EventKind::ChannelPressure {
            channel,
            pressure: vel.as_int(),
        },
    }
}

fn convert_meta(meta: MetaMessage) -> Meta {
    match meta {
        MetaMessage::TrackName(name) => Meta::TrackName(name.to_vec()),
        MetaMessage::Text(text) => Meta::Text(text.to_vec()),
        MetaMessage::Marker(text) => Meta::Marker(text.to_vec()),
        MetaMessage::Tempo(tempo) => Meta::Tempo(tempo.as_int()),
        MetaMessage::TimeSignature(numerator, denominator_pow, clocks_per_click, notated) => {
            Meta::TimeSignature {
                numerator,
                denominator_pow,
                clocks_per_click,
                notated_32nds_per_quarter: notated,
            }
        }
        MetaMessage::KeySignature(sharps, minor) => Meta::KeySignature { sharps, minor },
        MetaMessage::EndOfTrack => Meta::EndOfTrack,
        // The rest travel as raw type byte + payload
        MetaMessage::TrackNumber(number) => Meta::Other {
            kind: 0x00,
            payload: number.map(|n| n.to_be_bytes().to_vec()).unwrap_or_default(),
        },
        MetaMessage::Copyright(data) => raw(0x02, data),
        MetaMessage::InstrumentName(data) => raw(0x04, data),
        MetaMessage::Lyric(data) => raw(0x05, data),
        MetaMessage::CuePoint(data) => raw(0x07, data),
        MetaMessage::ProgramName(data) => raw(0x08, data),
        MetaMessage::DeviceName(data) => raw(0x09, data),
        MetaMessage::MidiChannel(channel) => raw(0x20, &[channel.as_int()]),
        MetaMessage::MidiPort(port) => raw(0x21, &[port.as_int()]),
        MetaMessage::SmpteOffset(time) => {
            let rate_bits: u8 = match time.fps() {
                Fps::Fps24 => 0,
                Fps::Fps25 => 1,
                Fps::Fps29 => 2,
                Fps::Fps30 => 3,
            };
            raw(
                0x54,
                &[
                    (rate_bits << 5) | time.hour(),
                    time.minute(),
                    time.second(),
                    time.frame(),
                    time.subframe(),
                ],
            )
        }
        MetaMessage::SequencerSpecific(data) => raw(0x7F, data),
        MetaMessage::Unknown(kind, data) => raw(kind, data),
    }
}

fn raw(kind: u8, payload: &[u8]) -> Meta {
    Meta::Other {
        kind,
        payload: payload.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_document(b"not a midi file").is_err());
        assert!(parse_document(&[]).is_err());
    }

    #[test]
    fn test_parses_minimal_single_track_file() {
        // Format 0, one track, 96 ticks per beat: NoteOn, NoteOff 96 later, EndOfTrack
        let bytes: Vec<u8> = vec![
            b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 0, 0, 1, 0, 96, //
            b'M', b'T', b'r', b'k', 0, 0, 0, 12, //
            0x00, 0x90, 60, 100, //
            0x60, 0x80, 60, 0, //
            0x00, 0xFF, 0x2F, 0x00,
        ];

        let doc = parse_document(&bytes).expect("valid file should parse");
        assert_eq!(doc.ticks_per_beat, 96);
        assert_eq!(doc.tracks.len(), 1);
        assert_eq!(doc.tracks[0].events[0], Event::note_on(0, 0, 60, 100));
        assert_eq!(doc.tracks[0].events[1], Event::note_off(96, 0, 60, 0));
        assert!(doc.tracks[0].events[2].is_end_of_track());
    }

    #[test]
    fn test_rejects_timecode_timing() {
        // Division with the top bit set selects SMPTE timing (-25 fps, 40 subframes)
        let bytes: Vec<u8> = vec![
            b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 0, 0, 1, 0xE7, 40, //
            b'M', b'T', b'r', b'k', 0, 0, 0, 4, //
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let err = parse_document(&bytes).unwrap_err();
        assert!(err.contains("timecode"));
    }
}
