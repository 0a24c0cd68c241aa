//! Job record store
//!
//! The authoritative per-job status table. Records are created once from the
//! discovered identities and kept in discovery order; the set of identities
//! never changes afterwards.

use std::collections::HashMap;
use woof_core::domain::job::{JobIdentity, JobRecord, JobStatus};

/// In-memory table of job records keyed by identity
#[derive(Debug, Clone, PartialEq)]
pub struct JobStore {
    records: Vec<JobRecord>,
    index: HashMap<JobIdentity, usize>,
}

impl JobStore {
    /// Creates one `Unknown` record per identity, keeping the first of duplicates
    pub fn new(identities: impl IntoIterator<Item = JobIdentity>) -> Self {
        let mut records = Vec::new();
        let mut index = HashMap::new();

        for identity in identities {
            if index.contains_key(&identity) {
                continue;
            }
            index.insert(identity.clone(), records.len());
            records.push(JobRecord::new(identity));
        }

        Self { records, index }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, identity: &JobIdentity) -> Option<&JobRecord> {
        self.index.get(identity).map(|&i| &self.records[i])
    }

    /// Records in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &JobRecord> {
        self.records.iter()
    }

    /// Sets a non-finished status
    ///
    /// Finished records are terminal and left untouched. Any other status
    /// clears the runtime, which only a finished job carries. Returns whether
    /// the record changed.
    pub fn set_status(&mut self, identity: &JobIdentity, status: JobStatus) -> bool {
        if status.is_finished() {
            return self.mark_finished(identity, None);
        }

        self.update(identity, |record| {
            record.status = status;
            record.runtime_seconds = None;
        })
    }

    /// Marks a job finished with the runtime read from its artifact
    pub fn mark_finished(&mut self, identity: &JobIdentity, runtime_seconds: Option<f64>) -> bool {
        self.update(identity, |record| {
            record.status = JobStatus::Finished;
            record.runtime_seconds = runtime_seconds;
        })
    }

    /// Records the scheduler job ID and state of a queued job
    ///
    /// Both fields are written together. Finished records are left untouched.
    pub fn set_queue_state(&mut self, identity: &JobIdentity, job_id: &str, state: &str) -> bool {
        self.update(identity, |record| {
            record.job_id = Some(job_id.to_string());
            record.status = JobStatus::Scheduler(state.to_string());
            record.runtime_seconds = None;
        })
    }

    // Applies `change` to a copy and swaps it in, so a record is replaced
    // whole and finished records are never modified.
    fn update(&mut self, identity: &JobIdentity, change: impl FnOnce(&mut JobRecord)) -> bool {
        let Some(&i) = self.index.get(identity) else {
            return false;
        };

        let current = &self.records[i];
        if current.status.is_finished() {
            return false;
        }

        let mut next = current.clone();
        change(&mut next);
        debug_assert_eq!(next.identity, current.identity);

        if next == *current {
            return false;
        }
        self.records[i] = next;
        true
    }
}
