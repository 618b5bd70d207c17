//! Default values for timeline assembly
//!
//! General MIDI tables used when the configuration doesn't override them.

/// Resolution used when no loaded fragment supplies one
pub const DEFAULT_TPB: u16 = 480;

/// General MIDI percussion channel (10 in 1-indexed terms)
pub const DRUM_CHANNEL: u8 = 9;

/// Channel for stems missing from the channel map
pub const DEFAULT_STEM_CHANNEL: u8 = 6;

/// Permission bits applied to written outputs (world-readable)
pub const DEFAULT_OUTPUT_MODE: u32 = 0o644;

/// Drum-kit stems and the GM percussion note each one is flattened onto
pub const DRUM_KIT_NOTES: [(&str, u8); 5] = [
    ("kick", 36),
    ("snare", 38),
    ("hi_hat", 42),  // Closed hi-hat
    ("cymbals", 49), // Crash 1
    ("toms", 47),    // Low-mid tom
];

/// Channel per instrument stem when layering stems into one document
pub const STEM_CHANNELS: [(&str, u8); 7] = [
    ("piano", 0),
    ("bass", 1),
    ("guitar", 2),
    ("vocals", 3),
    ("keys", 4),
    ("other", 5),
    ("drums", DRUM_CHANNEL),
];
