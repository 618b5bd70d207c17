//! Data model for MIDI documents, tracks, events and fragments

pub mod document;
pub mod event;
pub mod fragment;

pub use document::{Document, Track, DEFAULT_BEATS_PER_BAR};
pub use event::{Event, EventKind, Meta};
pub use fragment::Fragment;
