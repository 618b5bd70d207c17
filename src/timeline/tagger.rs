//! Program and channel assignment for assembled tracks

use crate::models::{Document, Event, EventKind, Meta, Track};
use serde::{Deserialize, Serialize};

/// Instrument to force onto a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstrumentTag {
    /// GM program (0-127); when set, it replaces every program change in the track
    #[serde(default)]
    pub program: Option<u8>,
    /// Channel (0-15) for every channel message in the track
    #[serde(default)]
    pub channel: Option<u8>,
}

impl InstrumentTag {
    pub fn program(program: u8) -> Self {
        Self { program: Some(program), channel: None }
    }

    pub fn channel(channel: u8) -> Self {
        Self { program: None, channel: Some(channel) }
    }
}

/// Rewrite the channel of every channel message in `track`
pub fn set_channel(track: &mut Track, channel: u8) {
    for event in &mut track.events {
        event.kind.set_channel(channel);
    }
}

/// Remove all program changes, carrying each removed delta onto the next event
///
/// Returns how many were removed.
pub fn strip_program_changes(track: &mut Track) -> usize {
    let mut removed = 0;
    let mut carried = 0u32;
    let mut kept = Vec::with_capacity(track.events.len());

    for mut event in track.events.drain(..) {
        if event.is_program_change() {
            carried = carried.saturating_add(event.delta);
            removed += 1;
            continue;
        }
        event.delta = event.delta.saturating_add(carried);
        carried = 0;
        kept.push(event);
    }
    // Trailing program changes leave their time as an empty end-of-track delta
    if carried > 0 {
        kept.push(Event::meta(carried, Meta::EndOfTrack));
    }

    track.events = kept;
    removed
}

/// Apply `tag` to one track
///
/// With a program set, any existing program changes are stripped and exactly
/// one new ProgramChange is inserted at delta 0. Meta and sysex events pass
/// through untouched.
pub fn tag_track(track: &mut Track, tag: &InstrumentTag) {
    if let Some(channel) = tag.channel {
        set_channel(track, channel);
    }

    if let Some(program) = tag.program {
        let removed = strip_program_changes(track);
        if removed > 0 {
            log::debug!("Replaced {} program change(s) with program {}", removed, program);
        }
        let channel = tag
            .channel
            .or_else(|| track.events.iter().find_map(|e| e.kind.channel()))
            .unwrap_or(0);
        track.events.insert(0, Event::new(0, EventKind::ProgramChange { channel, program }));
    }
}

pub fn tag_document(doc: &mut Document, tag: &InstrumentTag) {
    for track in &mut doc.tracks {
        tag_track(track, tag);
    }
}
