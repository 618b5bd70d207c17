//! A fragment is one independently produced document awaiting assembly

use super::document::Document;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Where the fragment came from (file name or caller label), used in logs
    pub source: String,
    pub document: Document,
}

impl Fragment {
    pub fn new(source: impl Into<String>, document: Document) -> Self {
        Self {
            source: source.into(),
            document,
        }
    }

    pub fn ticks_per_beat(&self) -> u16 {
        self.document.ticks_per_beat
    }

    pub fn content_length(&self) -> u64 {
        self.document.content_length()
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.document.beats_per_bar()
    }

    pub fn track_count(&self) -> usize {
        self.document.tracks.len()
    }
}
