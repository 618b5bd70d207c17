//! Directory-level orchestration: discovery, assembly and fallback

pub mod discovery;
pub mod fallback;
pub mod run;

pub use discovery::{classify, Candidate, Discovery, Role};
pub use fallback::{select_final, select_largest};
pub use run::{Engine, Outcome, RunReport, SkippedFragment};
