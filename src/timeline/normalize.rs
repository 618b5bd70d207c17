//! Leading-silence removal for a single fragment

use crate::models::{Document, Fragment};

/// Fragment-wide silence before the first sounding note
///
/// The minimum, over all tracks, of the tick of that track's first NoteOn
/// with velocity > 0. `None` when no track has one.
pub fn leading_offset(doc: &Document) -> Option<u64> {
    doc.tracks.iter().filter_map(|t| t.first_audible_tick()).min()
}

/// Shift a fragment so its first sounding note lands on tick 0
///
/// Returns a copy; the input is never modified. Each track gives up exactly
/// `offset` ticks of delta budget, taken from its earliest events, so spacing
/// after the consumed prefix is unchanged.
pub fn normalize(fragment: &Fragment) -> Fragment {
    let document = normalize_document(&fragment.document);
    if document != fragment.document {
        log::debug!(
            "Normalized {} (shifted -{} ticks)",
            fragment.source,
            leading_offset(&fragment.document).unwrap_or(0)
        );
    }
    Fragment::new(fragment.source.clone(), document)
}

pub fn normalize_document(doc: &Document) -> Document {
    let offset = match leading_offset(doc) {
        Some(offset) if offset > 0 => offset,
        _ => return doc.clone(),
    };

    let mut out = doc.clone();
    for track in &mut out.tracks {
        let mut removed = 0u64;
        for event in &mut track.events {
            if removed >= offset {
                break;
            }
            let take = (event.delta as u64).min(offset - removed);
            // take <= event.delta, so this stays in u32
            event.delta -= take as u32;
            removed += take;
        }
    }
    out
}
