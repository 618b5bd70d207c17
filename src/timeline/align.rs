//! Resolution rescaling and bar-grid slot sizing

use crate::models::{Document, Fragment};
use num_rational::Ratio;

/// Decides how many ticks a fragment occupies on the assembled timeline
///
/// Called with a fragment already rescaled to the timeline resolution.
pub trait SlotPolicy {
    fn slot_length(&self, fragment: &Fragment) -> u64;
}

/// Content length rounded up to whole bars, never less than one bar
#[derive(Debug, Clone, Copy, Default)]
pub struct BarAligned;

/// Every fragment takes the same number of bars regardless of content
#[derive(Debug, Clone, Copy)]
pub struct FixedBars {
    pub bars: u32,
}

/// Fragments follow each other with no grid: slot equals content length
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentLength;

impl SlotPolicy for BarAligned {
    fn slot_length(&self, fragment: &Fragment) -> u64 {
        let bar = ticks_per_bar(fragment.ticks_per_beat(), fragment.beats_per_bar());
        round_up_to_bar(fragment.content_length(), bar)
    }
}

impl SlotPolicy for FixedBars {
    fn slot_length(&self, fragment: &Fragment) -> u64 {
        self.bars as u64 * ticks_per_bar(fragment.ticks_per_beat(), fragment.beats_per_bar())
    }
}

impl SlotPolicy for ContentLength {
    fn slot_length(&self, fragment: &Fragment) -> u64 {
        fragment.content_length()
    }
}

/// A fragment at the timeline resolution together with its slot
#[derive(Debug, Clone)]
pub struct Aligned {
    pub fragment: Fragment,
    pub slot_length: u64,
}

pub fn ticks_per_bar(ticks_per_beat: u16, beats_per_bar: u32) -> u64 {
    ticks_per_beat as u64 * beats_per_bar as u64
}

/// Round `length` up to the next multiple of `bar`; zero still gets one bar
pub fn round_up_to_bar(length: u64, bar: u64) -> u64 {
    if bar == 0 {
        return length;
    }
    let bars = length.div_ceil(bar).max(1);
    bars * bar
}

/// Rescale one delta from `from` to `to` ticks-per-beat, rounding to nearest
pub fn rescale_delta(delta: u32, from: u16, to: u16) -> Result<u32, String> {
    if from == to {
        return Ok(delta);
    }
    if from == 0 {
        return Err("source resolution is zero".to_string());
    }
    let ratio = Ratio::new(to as u64, from as u64);
    let scaled = (Ratio::from_integer(delta as u64) * ratio).round().to_integer();
    u32::try_from(scaled).map_err(|_| format!("delta {} overflows after rescale {}->{}", delta, from, to))
}

/// Copy of `doc` with every delta rescaled to `target_tpb`
pub fn rescale_document(doc: &Document, target_tpb: u16) -> Result<Document, String> {
    if target_tpb == 0 {
        return Err("target resolution is zero".to_string());
    }
    let mut out = doc.clone();
    if doc.ticks_per_beat == target_tpb {
        return Ok(out);
    }
    for track in &mut out.tracks {
        for event in &mut track.events {
            event.delta = rescale_delta(event.delta, doc.ticks_per_beat, target_tpb)?;
        }
    }
    out.ticks_per_beat = target_tpb;
    Ok(out)
}

/// Rescale a fragment to `target_tpb` and compute its slot under `policy`
pub fn align(fragment: &Fragment, target_tpb: u16, policy: &dyn SlotPolicy) -> Result<Aligned, String> {
    let document = rescale_document(&fragment.document, target_tpb)
        .map_err(|e| format!("{}: {}", fragment.source, e))?;
    let fragment = Fragment::new(fragment.source.clone(), document);
    let slot_length = policy.slot_length(&fragment);
    Ok(Aligned {
        fragment,
        slot_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, Meta, Track};

    fn fragment_of_length(tpb: u16, length: u32) -> Fragment {
        let events = if length == 0 {
            vec![]
        } else {
            vec![Event::note_on(0, 0, 60, 80), Event::note_off(length, 0, 60, 0)]
        };
        Fragment::new("f", Document::with_tracks(tpb, vec![Track::from_events(events)]))
    }

    #[test]
    fn test_round_up_to_bar() {
        assert_eq!(round_up_to_bar(2500, 1920), 3840);
        assert_eq!(round_up_to_bar(1920, 1920), 1920);
        assert_eq!(round_up_to_bar(1921, 1920), 3840);
        assert_eq!(round_up_to_bar(0, 1920), 1920);
        assert_eq!(round_up_to_bar(1, 1920), 1920);
    }

    #[test]
    fn test_rescale_delta_rounds_to_nearest() {
        assert_eq!(rescale_delta(480, 480, 960).unwrap(), 960);
        assert_eq!(rescale_delta(1, 960, 480).unwrap(), 1); // 0.5 rounds away from zero
        assert_eq!(rescale_delta(100, 96, 480).unwrap(), 500);
        assert_eq!(rescale_delta(7, 480, 96).unwrap(), 1); // 1.4
        assert_eq!(rescale_delta(8, 480, 96).unwrap(), 2); // 1.6
    }

    #[test]
    fn test_rescale_document_changes_resolution() {
        let doc = fragment_of_length(96, 384).document;
        let out = rescale_document(&doc, 480).unwrap();
        assert_eq!(out.ticks_per_beat, 480);
        assert_eq!(out.content_length(), 1920);
        // Source untouched
        assert_eq!(doc.ticks_per_beat, 96);
    }

    #[test]
    fn test_bar_aligned_uses_time_signature() {
        let mut fragment = fragment_of_length(480, 1500);
        fragment.document.tracks[0].events.insert(
            0,
            Event::meta(
                0,
                Meta::TimeSignature {
                    numerator: 3,
                    denominator_pow: 2,
                    clocks_per_click: 24,
                    notated_32nds_per_quarter: 8,
                },
            ),
        );
        // 3/4 at 480 tpb: bar = 1440, 1500 ticks -> 2 bars
        assert_eq!(BarAligned.slot_length(&fragment), 2880);
    }

    #[test]
    fn test_fixed_bars_ignores_content() {
        let policy = FixedBars { bars: 8 };
        assert_eq!(policy.slot_length(&fragment_of_length(480, 100)), 8 * 1920);
        assert_eq!(policy.slot_length(&fragment_of_length(480, 50_000)), 8 * 1920);
    }

    #[test]
    fn test_align_rescales_before_sizing() {
        // 2 bars at 96 tpb become 2 bars at 480 tpb
        let aligned = align(&fragment_of_length(96, 768), 480, &BarAligned).unwrap();
        assert_eq!(aligned.fragment.ticks_per_beat(), 480);
        assert_eq!(aligned.slot_length, 3840);

        let aligned = align(&fragment_of_length(480, 700), 480, &ContentLength).unwrap();
        assert_eq!(aligned.slot_length, 700);
    }
}
