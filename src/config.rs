//! Engine configuration
//!
//! Everything the original pipelines hardcoded (drum note maps, channel
//! tables, file naming conventions) lives here and is passed in explicitly.
//! Configuration can be written in YAML:
//!
//! ```yaml
//! target_ticks_per_beat: 960
//! slot_policy:
//!   mode: fixed_bars
//!   bars: 32
//! instrument:
//!   program: 0
//! ```

use crate::defaults::{
    DEFAULT_OUTPUT_MODE, DEFAULT_STEM_CHANNEL, DRUM_CHANNEL, DRUM_KIT_NOTES, STEM_CHANNELS,
};
use crate::error::{Result, TimelineError};
use crate::timeline::{BarAligned, ContentLength, FixedBars, InstrumentTag, SlotPolicy, StemVoice};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Which slot policy the sequential assembler uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SlotMode {
    /// Content rounded up to whole bars
    #[default]
    BarAligned,
    /// Every part is exactly `bars` bars long
    FixedBars { bars: u32 },
    /// No grid, parts follow each other directly
    ContentLength,
}

impl SlotMode {
    pub fn policy(&self) -> Box<dyn SlotPolicy> {
        match *self {
            SlotMode::BarAligned => Box::new(BarAligned),
            SlotMode::FixedBars { bars } => Box::new(FixedBars { bars }),
            SlotMode::ContentLength => Box::new(ContentLength),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemChannel {
    pub label: String,
    pub channel: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeline resolution; `None` takes the first fragment's
    pub target_ticks_per_beat: Option<u16>,
    pub slot_policy: SlotMode,
    /// Strip leading silence from each fragment before alignment
    pub normalize_fragments: bool,

    /// File name prefixes, compared case-insensitively
    pub final_prefix: String,
    pub combined_prefix: String,
    pub part_prefix: String,
    pub stem_prefix: String,

    /// Merge sources in order, each with its fixed output note
    pub stem_voices: Vec<StemVoice>,
    /// Channel of the flattened merge track
    pub merge_channel: u8,

    /// Applied to every track of a sequential assembly
    pub instrument: Option<InstrumentTag>,

    pub stem_channels: Vec<StemChannel>,
    pub default_stem_channel: u8,

    /// Unix permission bits for written output
    pub output_mode: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_ticks_per_beat: None,
            slot_policy: SlotMode::default(),
            normalize_fragments: true,
            final_prefix: "final".to_string(),
            combined_prefix: "combined".to_string(),
            part_prefix: "part_".to_string(),
            stem_prefix: "stem_".to_string(),
            stem_voices: DRUM_KIT_NOTES
                .iter()
                .map(|&(label, note)| StemVoice::new(label, note))
                .collect(),
            merge_channel: DRUM_CHANNEL,
            instrument: None,
            stem_channels: STEM_CHANNELS
                .iter()
                .map(|&(label, channel)| StemChannel {
                    label: label.to_string(),
                    channel,
                })
                .collect(),
            default_stem_channel: DEFAULT_STEM_CHANNEL,
            output_mode: DEFAULT_OUTPUT_MODE,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TimelineError::InvalidConfig(format!("YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| TimelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(TimelineError::InvalidConfig(msg));

        if self.target_ticks_per_beat == Some(0) || self.target_ticks_per_beat > Some(0x7FFF) {
            return invalid(format!(
                "target_ticks_per_beat must be 1..=32767, got {:?}",
                self.target_ticks_per_beat
            ));
        }
        if let SlotMode::FixedBars { bars: 0 } = self.slot_policy {
            return invalid("fixed_bars needs at least one bar".to_string());
        }
        for (name, prefix) in [
            ("final_prefix", &self.final_prefix),
            ("combined_prefix", &self.combined_prefix),
            ("part_prefix", &self.part_prefix),
            ("stem_prefix", &self.stem_prefix),
        ] {
            if prefix.is_empty() {
                return invalid(format!("{} must not be empty", name));
            }
        }

        let mut seen = HashSet::new();
        for voice in &self.stem_voices {
            if voice.note > 127 {
                return invalid(format!("stem {} note {} out of range", voice.label, voice.note));
            }
            if !seen.insert(voice.label.to_lowercase()) {
                return invalid(format!("duplicate stem label {}", voice.label));
            }
        }

        let channels = self
            .stem_channels
            .iter()
            .map(|s| s.channel)
            .chain([self.merge_channel, self.default_stem_channel])
            .chain(self.instrument.and_then(|i| i.channel));
        for channel in channels {
            if channel > 15 {
                return invalid(format!("channel {} out of range", channel));
            }
        }
        if let Some(program) = self.instrument.and_then(|i| i.program) {
            if program > 127 {
                return invalid(format!("program {} out of range", program));
            }
        }
        Ok(())
    }

    /// Output note for a stem label, if it's a configured merge voice
    pub fn stem_voice(&self, label: &str) -> Option<&StemVoice> {
        self.stem_voices
            .iter()
            .find(|v| v.label.eq_ignore_ascii_case(label))
    }

    /// Mapped channel for an instrument stem label, if any
    pub fn stem_channel(&self, label: &str) -> Option<u8> {
        self.stem_channels
            .iter()
            .find(|s| s.label.eq_ignore_ascii_case(label))
            .map(|s| s.channel)
    }

    /// Channel for a layered instrument stem
    pub fn channel_for_stem(&self, label: &str) -> u8 {
        self.stem_channel(label).unwrap_or(self.default_stem_channel)
    }
}
