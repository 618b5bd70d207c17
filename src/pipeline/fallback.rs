//! Choosing an output without (or instead of) assembly
//!
//! The largest-file rule is a size proxy for "most complete take". It is
//! only an approximation: a long silent file can outweigh a short dense one.

use super::discovery::Candidate;

/// The single pre-combined result, if there is exactly one
pub fn select_final<'a>(finals: &[&'a Candidate]) -> Option<&'a Candidate> {
    match finals {
        [only] => Some(*only),
        [] => None,
        many => {
            log::warn!(
                "{} files look final ({}), assembling instead",
                many.len(),
                many.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
            );
            None
        }
    }
}

/// Largest non-empty candidate by byte size; ties go to the earlier name
pub fn select_largest<'a>(candidates: &[&'a Candidate]) -> Option<&'a Candidate> {
    candidates
        .iter()
        .copied()
        .filter(|c| c.size > 0)
        .max_by(|a, b| a.size.cmp(&b.size).then_with(|| b.name.cmp(&a.name)))
}
