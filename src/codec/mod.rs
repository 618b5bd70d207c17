//! Standard MIDI File decoding and encoding on top of midly

pub mod read;
pub mod write;

pub use read::{parse_document, read_document};
pub use write::{encode_document, write_bytes, write_document, MAX_DELTA};
