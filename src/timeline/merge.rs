//! Combining independently transcribed stems
//!
//! Two shapes are supported. `merge_voices` flattens several single-voice
//! stems (a drum kit split into kick, snare, ...) into one track, giving each
//! stem a fixed output note. `layer_stems` keeps each instrument stem on its
//! own tracks and only sorts out names and channels.

use super::align::rescale_document;
use super::tagger::set_channel;
use crate::models::{Document, Event, EventKind, Meta, Track};
use serde::{Deserialize, Serialize};

/// A stem label and the note every one of its hits is mapped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemVoice {
    pub label: String,
    pub note: u8,
}

impl StemVoice {
    pub fn new(label: impl Into<String>, note: u8) -> Self {
        Self {
            label: label.into(),
            note,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteAction {
    On,
    Off,
}

/// One note event of one voice, on the absolute timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedVoiceEvent {
    pub tick: u64,
    pub action: NoteAction,
    pub note: u8,
    pub velocity: u8,
    /// Index of the source in the merge input
    pub voice: usize,
}

/// Note events of one stem with their pitch replaced by `note`
///
/// Every track of the stem is walked; non-note events are dropped.
pub fn collect_voice_events(doc: &Document, note: u8, voice: usize) -> Vec<MergedVoiceEvent> {
    let mut out = Vec::new();
    for track in &doc.tracks {
        for (tick, event) in track.absolute_events() {
            let (action, velocity) = match event.kind {
                EventKind::NoteOn { velocity, .. } => (NoteAction::On, velocity),
                EventKind::NoteOff { velocity, .. } => (NoteAction::Off, velocity),
                _ => continue,
            };
            out.push(MergedVoiceEvent {
                tick,
                action,
                note,
                velocity,
                voice,
            });
        }
    }
    out
}

/// Flatten single-voice stems into a one-track document on `channel`
///
/// Sources are rescaled to `target_tpb` first. Events are stable-sorted by
/// absolute tick, so simultaneous hits keep source order. Stems that failed
/// upstream are simply absent from `sources`.
pub fn merge_voices(
    sources: &[(StemVoice, &Document)],
    target_tpb: u16,
    channel: u8,
) -> Result<Document, String> {
    let mut events = Vec::new();
    for (voice, (stem, doc)) in sources.iter().enumerate() {
        let doc = rescale_document(doc, target_tpb).map_err(|e| format!("{}: {}", stem.label, e))?;
        let collected = collect_voice_events(&doc, stem.note, voice);
        log::debug!("Stem {} contributed {} note events", stem.label, collected.len());
        events.extend(collected);
    }

    events.sort_by_key(|e| e.tick);

    let mut track = Track::new();
    let mut last_tick = 0u64;
    for event in &events {
        let delta = event.tick.saturating_sub(last_tick);
        let delta = u32::try_from(delta).map_err(|_| format!("delta {} overflows", delta))?;
        let kind = match event.action {
            NoteAction::On => EventKind::NoteOn { channel, key: event.note, velocity: event.velocity },
            NoteAction::Off => EventKind::NoteOff { channel, key: event.note, velocity: event.velocity },
        };
        track.push(Event::new(delta, kind));
        last_tick = event.tick;
    }

    Ok(Document::with_tracks(target_tpb, vec![track]))
}

/// Stack instrument stems as separate tracks in one document
///
/// Each source track is rescaled to `target_tpb`, copied behind an
/// upper-cased TrackName, and every channel message is moved to the channel
/// `channel_for` gives the label. A stem that can't be rescaled is left out
/// with a warning; it's an error only when nothing is left.
pub fn layer_stems<F>(
    stems: &[(String, &Document)],
    target_tpb: u16,
    channel_for: F,
) -> Result<Document, String>
where
    F: Fn(&str) -> u8,
{
    let mut out = Document::new(target_tpb);
    let mut layered = 0usize;

    for (label, doc) in stems {
        let doc = match rescale_document(doc, target_tpb) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Leaving out stem {}: {}", label, e);
                continue;
            }
        };
        let channel = channel_for(label);
        for source in &doc.tracks {
            let mut track = Track::new();
            track.push(Event::meta(0, Meta::TrackName(label.to_uppercase().into_bytes())));
            track.events.extend(source.events.iter().cloned());
            set_channel(&mut track, channel);
            out.tracks.push(track);
        }
        layered += 1;
    }

    if layered == 0 {
        return Err("no stems to layer".to_string());
    }
    Ok(out)
}
