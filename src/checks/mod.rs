//! The individual transcript checks.
//!
//! Each check reads a loaded [`Transcript`](crate::core::transcript::Transcript)
//! (plus the value index or flow records where it needs them) and returns
//! issues; none of them stops at the first finding.

pub mod hallucination;
pub mod identifiers;
pub mod placeholder;
pub mod sequence;
pub mod tokens;
