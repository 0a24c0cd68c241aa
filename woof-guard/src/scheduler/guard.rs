//! Refresh loop
//!
//! Runs a reconciliation cycle on every tick, redraws the dashboard and
//! closes the scheduler session on shutdown.

use anyhow::{Context, Result};
use chrono::Local;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use woof_client::RemoteQueryClient;
use woof_core::domain::group::Severity;

use crate::presenter::{self, DEFAULT_TERMINAL_WIDTH, DashboardOptions, Header, Terminal};
use crate::service::{CheckReport, QueueState, Reconciler, summarize};
use crate::store::JobStore;

/// Owns the job store and drives the refresh cycles
pub struct Guard<T: Terminal> {
    root: PathBuf,
    store: JobStore,
    reconciler: Reconciler,
    client: Arc<dyn RemoteQueryClient>,
    terminal: T,
    options: DashboardOptions,
    refresh_interval: Duration,
}

impl<T: Terminal> Guard<T> {
    /// Creates a new guard
    ///
    /// `client` must be the transport the reconciler queries through; the
    /// guard only uses it to close the session on exit.
    pub fn new(
        root: PathBuf,
        store: JobStore,
        reconciler: Reconciler,
        client: Arc<dyn RemoteQueryClient>,
        terminal: T,
        options: DashboardOptions,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            root,
            store,
            reconciler,
            client,
            terminal,
            options,
            refresh_interval,
        }
    }

    /// Refreshes until Ctrl-C
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Refreshes until `shutdown` completes
    ///
    /// The first cycle starts immediately. A cycle in progress is abandoned
    /// when `shutdown` fires; the store is only touched between await points,
    /// so it stays consistent.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        info!(
            "Starting refresh loop (interval: {:?}, {} job(s))",
            self.refresh_interval,
            self.store.len()
        );

        let mut interval = time::interval(self.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = async {
                    interval.tick().await;
                    self.cycle().await
                } => {
                    if let Err(e) = result {
                        error!("Error during refresh cycle: {:#}", e);
                    }
                }
            }
        }

        let notice = format!("Interrupted, closing session to {}", self.client.describe());
        info!("{}", notice);
        if let Err(e) = self
            .terminal
            .write_line(&notice, Severity::Normal)
            .and_then(|_| self.terminal.flush())
        {
            warn!("Failed to write to terminal: {}", e);
        }

        self.close().await;
        Ok(())
    }

    /// Runs a single cycle, then closes the session
    pub async fn run_once(&mut self) -> Result<()> {
        let result = self.cycle().await;
        self.close().await;
        result.map(|_| ())
    }

    /// One reconciliation followed by a redraw
    async fn cycle(&mut self) -> Result<CheckReport> {
        debug!("Checking {} job(s)", self.store.len());

        let report = self.reconciler.check(&mut self.store).await;

        if report.changed > 0 {
            info!("{} job(s) changed state this cycle", report.changed);
        }
        debug!(
            "Cycle done: inspected={}, matched={}, unmatched={}, skipped_rows={}, ignored_finished={}",
            report.inspected,
            report.matched,
            report.unmatched,
            report.skipped_rows,
            report.ignored_finished
        );

        self.draw(&report.queue).context("Failed to draw dashboard")?;
        Ok(report)
    }

    fn draw(&mut self, queue: &QueueState) -> std::io::Result<()> {
        let summaries = summarize(&self.store);
        let header = Header {
            checked_at: Local::now(),
            root: &self.root,
            queue,
        };
        let width = self.terminal.width().unwrap_or(DEFAULT_TERMINAL_WIDTH);
        let lines = presenter::render(&header, &summaries, &self.options, width);

        presenter::present(&mut self.terminal, &lines)
    }

    async fn close(&self) {
        match self.client.close().await {
            Ok(()) => debug!("Closed session to {}", self.client.describe()),
            Err(e) => warn!("Failed to close session to {}: {:#}", self.client.describe(), e),
        }
    }

    #[cfg(test)]
    fn terminal(&self) -> &T {
        &self.terminal
    }
}
