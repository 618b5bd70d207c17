use crate::error::{Result, TimelineError};
use crate::models::{Document, Event, EventKind, Meta};
use midly::num::{u14, u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, Track, TrackEvent, TrackEventKind};
use std::path::Path;

/// Largest delta a variable-length quantity can hold
pub const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// Encode a Document as Standard MIDI File bytes
///
/// One track is written as Format 0, several as Format 1. Each track ends
/// with exactly one EndOfTrack: interior EndOfTrack events are dropped and
/// their delta moves onto the next event, so nothing shifts in time.
pub fn encode_document(doc: &Document) -> std::result::Result<Vec<u8>, String> {
    if doc.ticks_per_beat == 0 || doc.ticks_per_beat > 0x7FFF {
        return Err(format!("ticks per beat {} out of range", doc.ticks_per_beat));
    }

    let tracks = doc
        .tracks
        .iter()
        .map(|track| build_track(&track.events))
        .collect::<std::result::Result<Vec<_>, String>>()?;

    let format = if tracks.len() == 1 {
        Format::SingleTrack
    } else {
        Format::Parallel
    };
    let smf = Smf {
        header: Header {
            format,
            timing: Timing::Metrical(u15::from(doc.ticks_per_beat)),
        },
        tracks,
    };

    let mut out = Vec::new();
    smf.write(&mut out)
        .map_err(|e| format!("Failed to write MIDI: {}", e))?;
    Ok(out)
}

/// Encode and write a Document, then apply `mode` (Unix permission bits)
pub fn write_document(doc: &Document, path: &Path, mode: u32) -> Result<()> {
    let bytes = encode_document(doc).map_err(|reason| TimelineError::WriteFailure {
        path: path.to_path_buf(),
        reason,
    })?;
    write_bytes(&bytes, path, mode)
}

/// Write already-encoded bytes to `path` with the given permissions
pub fn write_bytes(bytes: &[u8], path: &Path, mode: u32) -> Result<()> {
    let failure = |e: std::io::Error| TimelineError::WriteFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    std::fs::write(path, bytes).map_err(failure)?;
    set_mode(path, mode).map_err(failure)
}

#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

fn build_track(events: &[Event]) -> std::result::Result<Track<'_>, String> {
    let mut out = Vec::with_capacity(events.len() + 1);
    let mut carried = 0u32;

    for event in events {
        let delta = checked_delta(carried, event.delta)?;
        if event.is_end_of_track() {
            carried = delta;
            continue;
        }
        out.push(TrackEvent {
            delta: u28::from(delta),
            kind: convert_kind(&event.kind),
        });
        carried = 0;
    }

    out.push(TrackEvent {
        delta: u28::from(carried),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    Ok(out)
}

fn checked_delta(carried: u32, delta: u32) -> std::result::Result<u32, String> {
    carried
        .checked_add(delta)
        .filter(|&d| d <= MAX_DELTA)
        .ok_or_else(|| format!("delta {} + {} exceeds the SMF maximum", carried, delta))
}

fn convert_kind(kind: &EventKind) -> TrackEventKind<'_> {
    let midi = |channel: u8, message: MidiMessage| TrackEventKind::Midi {
        channel: u4::from(channel),
        message,
    };
    match kind {
        EventKind::NoteOn { channel, key, velocity } => midi(
            *channel,
            MidiMessage::NoteOn { key: u7::from(*key), vel: u7::from(*velocity) },
        ),
        EventKind::NoteOff { channel, key, velocity } => midi(
            *channel,
            MidiMessage::NoteOff { key: u7::from(*key), vel: u7::from(*velocity) },
        ),
        EventKind::ProgramChange { channel, program } => midi(
            *channel,
            MidiMessage::ProgramChange { program: u7::from(*program) },
        ),
        EventKind::Controller { channel, controller, value } => midi(
            *channel,
            MidiMessage::Controller {
                controller: u7::from(*controller),
                value: u7::from(*value),
            },
        ),
        EventKind::PitchBend { channel, bend } => midi(
            *channel,
            MidiMessage::PitchBend { bend: PitchBend(u14::from(*bend)) },
        ),
        EventKind::KeyPressure { channel, key, pressure } => midi(
            *channel,
            MidiMessage::Aftertouch { key: u7::from(*key), vel: u7::from(*pressure) },
        ),
        EventKind::ChannelPressure { channel, pressure } => midi(
            *channel,
            MidiMessage::ChannelAftertouch { vel: u7::from(*pressure) },
        ),
        EventKind::Meta(meta) => TrackEventKind::Meta(convert_meta(meta)),
        EventKind::SysEx(data) => TrackEventKind::SysEx(data),
        EventKind::Escape(data) => TrackEventKind::Escape(data),
    }
}

fn convert_meta(meta: &Meta) -> MetaMessage<'_> {
    match meta {
        Meta::TrackName(name) => MetaMessage::TrackName(name),
        Meta::Text(text) => MetaMessage::Text(text),
        Meta::Marker(text) => MetaMessage::Marker(text),
        Meta::Tempo(tempo) => MetaMessage::Tempo(u24::from(*tempo)),
        Meta::TimeSignature {
            numerator,
            denominator_pow,
            clocks_per_click,
            notated_32nds_per_quarter,
        } => MetaMessage::TimeSignature(
            *numerator,
            *denominator_pow,
            *clocks_per_click,
            *notated_32nds_per_quarter,
        ),
        Meta::KeySignature { sharps, minor } => MetaMessage::KeySignature(*sharps, *minor),
        Meta::EndOfTrack => MetaMessage::EndOfTrack,
        Meta::Other { kind, payload } => MetaMessage::Unknown(*kind, payload),
    }
}
