//! Closed event model for MIDI track content
//!
//! Every message a Standard MIDI File can carry maps to exactly one variant
//! here, so the tagger and the merger can match exhaustively instead of
//! skipping message types they don't recognise.

/// One track event: a delta-time in ticks plus its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Ticks since the previous event in the same track
    pub delta: u32,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ProgramChange { channel: u8, program: u8 },
    Controller { channel: u8, controller: u8, value: u8 },
    /// 14-bit bend value, 0x2000 is centre
    PitchBend { channel: u8, bend: u16 },
    KeyPressure { channel: u8, key: u8, pressure: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    Meta(Meta),
    SysEx(Vec<u8>),
    Escape(Vec<u8>),
}

/// Meta events the engine inspects, plus a raw carrier for everything else
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Meta {
    TrackName(Vec<u8>),
    Text(Vec<u8>),
    Marker(Vec<u8>),
    /// Microseconds per quarter note
    Tempo(u32),
    TimeSignature {
        numerator: u8,
        /// Denominator as a power of two (2 = quarter)
        denominator_pow: u8,
        clocks_per_click: u8,
        notated_32nds_per_quarter: u8,
    },
    KeySignature { sharps: i8, minor: bool },
    EndOfTrack,
    /// Any other meta type, kept byte-for-byte
    Other { kind: u8, payload: Vec<u8> },
}

impl Event {
    pub fn new(delta: u32, kind: EventKind) -> Self {
        Self { delta, kind }
    }

    pub fn note_on(delta: u32, channel: u8, key: u8, velocity: u8) -> Self {
        Self::new(delta, EventKind::NoteOn { channel, key, velocity })
    }

    pub fn note_off(delta: u32, channel: u8, key: u8, velocity: u8) -> Self {
        Self::new(delta, EventKind::NoteOff { channel, key, velocity })
    }

    pub fn program_change(delta: u32, channel: u8, program: u8) -> Self {
        Self::new(delta, EventKind::ProgramChange { channel, program })
    }

    pub fn meta(delta: u32, meta: Meta) -> Self {
        Self::new(delta, EventKind::Meta(meta))
    }

    /// True for a NoteOn that actually sounds (velocity > 0)
    pub fn is_audible_note_on(&self) -> bool {
        matches!(self.kind, EventKind::NoteOn { velocity, .. } if velocity > 0)
    }

    pub fn is_program_change(&self) -> bool {
        matches!(self.kind, EventKind::ProgramChange { .. })
    }

    pub fn is_end_of_track(&self) -> bool {
        matches!(self.kind, EventKind::Meta(Meta::EndOfTrack))
    }
}

impl EventKind {
    /// Channel of a channel-voice message, `None` for meta/sysex
    pub fn channel(&self) -> Option<u8> {
        match *self {
            EventKind::NoteOn { channel, .. }
            | EventKind::NoteOff { channel, .. }
            | EventKind::ProgramChange { channel, .. }
            | EventKind::Controller { channel, .. }
            | EventKind::PitchBend { channel, .. }
            | EventKind::KeyPressure { channel, .. }
            | EventKind::ChannelPressure { channel, .. } => Some(channel),
            EventKind::Meta(_) | EventKind::SysEx(_) | EventKind::Escape(_) => None,
        }
    }

    /// Rewrite the channel of a channel-voice message; other kinds are untouched
    pub fn set_channel(&mut self, new_channel: u8) {
        match self {
            EventKind::NoteOn { channel, .. }
            | EventKind::NoteOff { channel, .. }
            | EventKind::ProgramChange { channel, .. }
            | EventKind::Controller { channel, .. }
            | EventKind::PitchBend { channel, .. }
            | EventKind::KeyPressure { channel, .. }
            | EventKind::ChannelPressure { channel, .. } => *channel = new_channel,
            EventKind::Meta(_) | EventKind::SysEx(_) | EventKind::Escape(_) => {}
        }
    }
}
