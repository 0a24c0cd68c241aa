//! Scheduling layer of the watchdog
//!
//! Drives the periodic refresh: reconcile, summarize, redraw. It also owns
//! shutdown and closes the scheduler session on the way out.

pub mod guard;

pub use guard::Guard;
