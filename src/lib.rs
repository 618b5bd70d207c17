//! MIDI Timeline Assembly
//!
//! Takes MIDI fragments produced independently (one per composition part,
//! or one per transcribed voice) and assembles them into a single,
//! temporally coherent multi-track MIDI document.

pub mod codec;
pub mod config;
pub mod defaults;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod timeline;

// Re-export commonly used types
pub use config::{EngineConfig, SlotMode};
pub use error::{Result, TimelineError};
pub use models::{Document, Event, EventKind, Fragment, Meta, Track};
pub use pipeline::{Engine, Outcome, RunReport};
