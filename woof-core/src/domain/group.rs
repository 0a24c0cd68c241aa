//! Group summary types
//!
//! A group is a directory holding several related jobs (for example the
//! replicas of one experiment). Summaries are recomputed on every cycle.

use std::path::PathBuf;

use super::job::group_short_name;

/// Label shown for a group whose jobs have all finished
pub const FINISHED_LABEL: &str = "FINISHED";

/// Severity of a dashboard line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Nothing notable
    Normal,
    /// Every job of the group finished
    Complete,
    /// At least one job of the group crashed
    Error,
}

/// Progress figures for one group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub group: PathBuf,
    pub job_count: usize,
    pub finished_count: usize,
    pub has_crashed: bool,
    /// Mean runtime of finished jobs with a known runtime
    pub average_runtime_seconds: Option<f64>,
    /// Estimated remaining hours, `None` when no runtime is known yet
    pub eta_hours: Option<f64>,
    pub status_label: String,
}

impl GroupSummary {
    /// Display name of the group (last path component)
    pub fn short_name(&self) -> String {
        group_short_name(&self.group)
    }

    pub fn is_complete(&self) -> bool {
        self.job_count > 0 && self.finished_count == self.job_count
    }

    /// Finished fraction in `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        if self.job_count == 0 {
            return 0.0;
        }
        self.finished_count as f64 / self.job_count as f64
    }

    /// A crash outranks completion
    pub fn severity(&self) -> Severity {
        if self.has_crashed {
            Severity::Error
        } else if self.is_complete() {
            Severity::Complete
        } else {
            Severity::Normal
        }
    }
}
