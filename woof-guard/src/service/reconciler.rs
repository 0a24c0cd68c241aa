//! Reconciler
//!
//! Brings the job store up to date once per poll cycle by merging two
//! independent signals:
//!
//! 1. Phase A, local artifacts: every job that has not finished is classified
//!    from its completion artifact (missing, crashed or finished).
//! 2. Phase B, scheduler queue: the queue listing is fetched once and every
//!    listed job overrides the artifact-derived status with the scheduler
//!    state, so running and queued jobs become visible.
//!
//! A finished job is terminal: its artifact is not read again and the queue
//! never overrides it, even if the scheduler still lists it for a while after
//! completion. A failing queue query never aborts the cycle; the last good
//! snapshot is re-applied and the failure is reported in [`QueueState`].

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{debug, warn};
use woof_client::RemoteQueryClient;
use woof_core::domain::job::{JobIdentity, JobRecord, JobStatus};
use woof_core::queue::QueueSnapshot;

use crate::service::artifact::{self, ArtifactRules, ArtifactState};
use crate::store::JobStore;

/// Health of the queue signal after the latest cycle
#[derive(Debug, Clone, PartialEq)]
pub enum QueueState {
    /// No query has been attempted yet
    NotQueried,
    /// The latest query succeeded
    Live {
        taken_at: DateTime<Local>,
        listed: usize,
    },
    /// The latest query failed
    Unavailable {
        error: String,
        /// Time of the snapshot re-applied instead, if any
        stale_since: Option<DateTime<Local>>,
    },
}

/// Outcome of one call to [`Reconciler::check`]
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    /// Records whose content differs from before the cycle
    pub changed: usize,
    /// Artifacts read in Phase A
    pub inspected: usize,
    /// Queue rows that mapped to a known job
    pub matched: usize,
    /// Queue rows for jobs outside the watched tree
    pub unmatched: usize,
    /// Malformed queue rows
    pub skipped_rows: usize,
    /// Queue rows ignored because the job already finished
    pub ignored_finished: usize,
    pub queue: QueueState,
}

#[derive(Debug, Default)]
struct MergeCounts {
    matched: usize,
    unmatched: usize,
    ignored_finished: usize,
    skipped_rows: usize,
}

/// Settings for the queue query
#[derive(Debug, Clone)]
pub struct QueueQuery {
    /// Fully substituted command line
    pub command: String,
    pub delimiter: char,
}

/// Per-cycle state reconciliation
pub struct Reconciler {
    client: Arc<dyn RemoteQueryClient>,
    rules: ArtifactRules,
    query: QueueQuery,
    last_snapshot: Option<QueueSnapshot>,
    queue_state: QueueState,
}

impl Reconciler {
    pub fn new(client: Arc<dyn RemoteQueryClient>, rules: ArtifactRules, query: QueueQuery) -> Self {
        Self {
            client,
            rules,
            query,
            last_snapshot: None,
            queue_state: QueueState::NotQueried,
        }
    }

    /// Runs one reconciliation cycle against `store`
    ///
    /// Phase A always completes before the queue is queried. The only await
    /// point is the query itself, so a cancelled cycle leaves every record
    /// either fully updated or untouched.
    pub async fn check(&mut self, store: &mut JobStore) -> CheckReport {
        let before: Vec<JobRecord> = store.iter().cloned().collect();

        let inspected = self.scan_artifacts(store);

        let counts = match self.fetch_snapshot().await {
            Ok(snapshot) => {
                if !snapshot.skipped.is_empty() {
                    debug!("Skipped {} malformed queue row(s)", snapshot.skipped.len());
                }
                self.queue_state = QueueState::Live {
                    taken_at: snapshot.taken_at,
                    listed: snapshot.entries.len() + snapshot.skipped.len(),
                };
                let mut counts = merge_snapshot(store, &snapshot);
                counts.skipped_rows = snapshot.skipped.len();
                self.last_snapshot = Some(snapshot);
                counts
            }
            Err(e) => {
                warn!("Queue query failed, keeping previous queue data: {:#}", e);
                self.queue_state = QueueState::Unavailable {
                    error: format!("{:#}", e),
                    stale_since: self.last_snapshot.as_ref().map(|s| s.taken_at),
                };
                match &self.last_snapshot {
                    Some(snapshot) => merge_snapshot(store, snapshot),
                    None => MergeCounts::default(),
                }
            }
        };

        let changed = store
            .iter()
            .zip(before.iter())
            .filter(|(after, before)| after != before)
            .count();

        CheckReport {
            changed,
            inspected,
            matched: counts.matched,
            unmatched: counts.unmatched,
            skipped_rows: counts.skipped_rows,
            ignored_finished: counts.ignored_finished,
            queue: self.queue_state.clone(),
        }
    }

    /// Phase A: classify every unfinished job from its artifact
    fn scan_artifacts(&self, store: &mut JobStore) -> usize {
        let unfinished: Vec<JobIdentity> = store
            .iter()
            .filter(|record| !record.status.is_finished())
            .map(|record| record.identity.clone())
            .collect();

        for identity in &unfinished {
            match artifact::inspect(identity, &self.rules) {
                ArtifactState::Missing => {
                    store.set_status(identity, JobStatus::Pending);
                }
                ArtifactState::Unreadable(reason) => {
                    debug!("Artifact of {} unreadable, treating as pending: {}", identity, reason);
                    store.set_status(identity, JobStatus::Pending);
                }
                ArtifactState::Finished { runtime_seconds } => {
                    debug!("{} finished (runtime {:?}s)", identity, runtime_seconds);
                    store.mark_finished(identity, runtime_seconds);
                }
                ArtifactState::Crashed => {
                    store.set_status(identity, JobStatus::Crashed);
                }
            }
        }

        unfinished.len()
    }

    /// Phase B, first half: run the queue query and parse its output
    async fn fetch_snapshot(&self) -> Result<QueueSnapshot> {
        let output = self
            .client
            .run(&self.query.command)
            .await
            .with_context(|| format!("Failed to query scheduler on {}", self.client.describe()))?;

        let stdout = output
            .into_stdout(&self.query.command)
            .context("Scheduler query failed")?;

        Ok(QueueSnapshot::parse(&stdout, self.query.delimiter, Local::now()))
    }
}

/// Phase B, second half: apply queue entries to matching records
fn merge_snapshot(store: &mut JobStore, snapshot: &QueueSnapshot) -> MergeCounts {
    let mut counts = MergeCounts::default();

    for entry in &snapshot.entries {
        let Some(record) = store.get(&entry.identity) else {
            counts.unmatched += 1;
            continue;
        };

        if record.status.is_finished() {
            counts.ignored_finished += 1;
            continue;
        }

        store.set_queue_state(&entry.identity, &entry.job_id, &entry.state);
        counts.matched += 1;
    }

    counts
}
