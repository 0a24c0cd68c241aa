//! Service layer
//!
//! The per-cycle logic of the watchdog: reading completion artifacts,
//! reconciling them with the scheduler queue, and rolling records up into
//! group summaries.

pub mod aggregator;
pub mod artifact;
pub mod reconciler;

pub use aggregator::summarize;
pub use artifact::ArtifactRules;
pub use reconciler::{CheckReport, QueueQuery, QueueState, Reconciler};
