//! In-memory MIDI document: a resolution plus ordered tracks of delta-timed events

use super::event::{Event, EventKind, Meta};

/// Beats per bar assumed when no time signature is present
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Track {
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Ticks per quarter note, always positive
    pub ticks_per_beat: u16,
    /// Insertion order is output order
    pub tracks: Vec<Track>,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Absolute tick after the last event (sum of all deltas)
    pub fn end_tick(&self) -> u64 {
        self.events.iter().map(|e| e.delta as u64).sum()
    }

    /// Events paired with their absolute tick
    pub fn absolute_events(&self) -> impl Iterator<Item = (u64, &Event)> {
        self.events.iter().scan(0u64, |tick, event| {
            *tick += event.delta as u64;
            Some((*tick, event))
        })
    }

    /// Absolute tick of the first NoteOn with velocity > 0
    pub fn first_audible_tick(&self) -> Option<u64> {
        self.absolute_events()
            .find(|(_, e)| e.is_audible_note_on())
            .map(|(tick, _)| tick)
    }

    /// Numerator of the first time signature in this track
    pub fn time_signature_numerator(&self) -> Option<u8> {
        self.events.iter().find_map(|e| match e.kind {
            EventKind::Meta(Meta::TimeSignature { numerator, .. }) => Some(numerator),
            _ => None,
        })
    }
}

impl Document {
    pub fn new(ticks_per_beat: u16) -> Self {
        Self {
            ticks_per_beat,
            tracks: Vec::new(),
        }
    }

    pub fn with_tracks(ticks_per_beat: u16, tracks: Vec<Track>) -> Self {
        Self {
            ticks_per_beat,
            tracks,
        }
    }

    /// Max cumulative tick across all tracks
    pub fn content_length(&self) -> u64 {
        self.tracks.iter().map(Track::end_tick).max().unwrap_or(0)
    }

    /// Read from the first time signature in the first track; 4 when absent or zero
    pub fn beats_per_bar(&self) -> u32 {
        self.tracks
            .first()
            .and_then(Track::time_signature_numerator)
            .filter(|&n| n > 0)
            .map(u32::from)
            .unwrap_or(DEFAULT_BEATS_PER_BAR)
    }

    /// True when some track sounds at least one note
    ///
    /// Conductor data alone (tempo, names, markers) doesn't count.
    pub fn has_audible_notes(&self) -> bool {
        self.tracks.iter().any(|t| t.first_audible_tick().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_sig(numerator: u8) -> Event {
        Event::meta(
            0,
            Meta::TimeSignature {
                numerator,
                denominator_pow: 2,
                clocks_per_click: 24,
                notated_32nds_per_quarter: 8,
            },
        )
    }

    #[test]
    fn test_content_length_is_longest_track() {
        let doc = Document::with_tracks(
            480,
            vec![
                Track::from_events(vec![Event::note_on(100, 0, 60, 80), Event::note_off(380, 0, 60, 0)]),
                Track::from_events(vec![Event::note_on(0, 1, 48, 80), Event::note_off(1920, 1, 48, 0)]),
            ],
        );
        assert_eq!(doc.content_length(), 1920);
        assert_eq!(doc.tracks[0].end_tick(), 480);
    }

    #[test]
    fn test_first_audible_tick_skips_zero_velocity() {
        let track = Track::from_events(vec![
            Event::meta(0, Meta::TrackName(b"Bass".to_vec())),
            Event::note_on(240, 0, 40, 0),
            Event::note_on(240, 0, 40, 90),
        ]);
        assert_eq!(track.first_audible_tick(), Some(480));
        assert_eq!(Track::new().first_audible_tick(), None);
    }

    #[test]
    fn test_beats_per_bar_from_first_track_only() {
        let mut doc = Document::new(480);
        assert_eq!(doc.beats_per_bar(), DEFAULT_BEATS_PER_BAR);

        doc.tracks.push(Track::from_events(vec![Event::note_on(0, 0, 60, 80)]));
        doc.tracks.push(Track::from_events(vec![time_sig(7)]));
        assert_eq!(doc.beats_per_bar(), 4);

        doc.tracks[0].events.insert(0, time_sig(3));
        assert_eq!(doc.beats_per_bar(), 3);
    }

    #[test]
    fn test_audible_notes_ignore_meta_and_silent_note_ons() {
        let mut doc = Document::with_tracks(480, vec![Track::new()]);
        assert!(!doc.has_audible_notes());
        doc.tracks[0].push(Event::meta(0, Meta::Tempo(500_000)));
        doc.tracks[0].push(Event::meta(0, Meta::TrackName(b"Pad".to_vec())));
        doc.tracks[0].push(Event::note_on(0, 0, 60, 0));
        doc.tracks[0].push(Event::meta(1920, Meta::EndOfTrack));
        assert!(!doc.has_audible_notes());

        doc.tracks.push(Track::from_events(vec![Event::note_on(240, 0, 60, 90)]));
        assert!(doc.has_audible_notes());
    }
}
