//! Timeline assembly: normalize, align, stitch, merge and tag

pub mod align;
pub mod assemble;
pub mod merge;
pub mod normalize;
pub mod tagger;

pub use align::{align, Aligned, BarAligned, ContentLength, FixedBars, SlotPolicy};
pub use assemble::{assemble, Assembler, AssemblyState, Placement};
pub use merge::{layer_stems, merge_voices, MergedVoiceEvent, StemVoice};
pub use normalize::normalize;
pub use tagger::{tag_document, tag_track, InstrumentTag};
