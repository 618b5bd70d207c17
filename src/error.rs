//! Error types for timeline assembly
//!
//! Failures split into recoverable ones, absorbed per fragment or handed to
//! the fallback selector, and fatal ones that end the run and reach the caller.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimelineError {
    /// Fatal: the working directory holds no MIDI fragment files at all
    #[error("no MIDI fragments found in {}", dir.display())]
    MissingFragments { dir: PathBuf },

    /// Recoverable: one fragment failed to parse and is skipped
    #[error("unreadable fragment {}: {reason}", path.display())]
    UnreadableFragment { path: PathBuf, reason: String },

    /// Recoverable at the pipeline level: triggers the fallback selector
    #[error("assembly failed during {stage} ({usable} usable fragments): {reason}")]
    AssemblyFailure {
        stage: &'static str,
        usable: usize,
        reason: String,
    },

    /// Fatal: assembly failed and nothing could stand in for it
    #[error("no fallback available in {}: {reason}", dir.display())]
    NoFallbackAvailable { dir: PathBuf, reason: String },

    /// Fatal: the output could not be written
    #[error("failed to write {}: {reason}", path.display())]
    WriteFailure { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TimelineError {
    pub(crate) fn assembly(stage: &'static str, usable: usize, reason: impl Into<String>) -> Self {
        TimelineError::AssemblyFailure {
            stage,
            usable,
            reason: reason.into(),
        }
    }

    /// Failures the pipeline absorbs instead of aborting the run
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TimelineError::UnreadableFragment { .. } | TimelineError::AssemblyFailure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TimelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = TimelineError::assembly("stitch", 3, "tick overflow");
        assert_eq!(
            err.to_string(),
            "assembly failed during stitch (3 usable fragments): tick overflow"
        );
        assert!(err.is_recoverable());

        let err = TimelineError::MissingFragments { dir: PathBuf::from("/tmp/run") };
        assert!(err.to_string().contains("/tmp/run"));
        assert!(!err.is_recoverable());
    }
}
