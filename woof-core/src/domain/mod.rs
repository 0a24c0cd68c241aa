//! Core domain types
//!
//! The structures shared by the reconciler, the aggregator and the presenter.

pub mod group;
pub mod job;
