//! Woof Core
//!
//! Core types for the woof simulation watchdog.
//!
//! This crate contains:
//! - Domain types: jobs, their statuses and per-group summaries
//! - Queue: parsing of scheduler queue listings into snapshots
//! - Natural ordering used to sort discovered jobs
//!
//! Nothing in here touches the filesystem or the network; the guard binary
//! owns all I/O.

pub mod domain;
pub mod natural;
pub mod queue;
