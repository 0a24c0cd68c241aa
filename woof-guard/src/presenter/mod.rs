//! Dashboard presenter
//!
//! Formats group summaries as fixed-width text lines. Rendering is pure; the
//! lines are handed to a [`Terminal`] which owns clearing and coloring.

pub mod terminal;

pub use terminal::{ConsoleTerminal, Terminal};

use chrono::{DateTime, Local};
use std::io;
use std::path::Path;
use woof_core::domain::group::{GroupSummary, Severity};

use crate::service::QueueState;

/// Width used when the terminal size cannot be determined
pub const DEFAULT_TERMINAL_WIDTH: usize = 120;

const NAME_WIDTH: usize = 30;
const COUNT_WIDTH: usize = 10;
const STATUS_WIDTH: usize = 16;
const ETA_WIDTH: usize = 10;
const ROW_WIDTH: usize = NAME_WIDTH + 2 * COUNT_WIDTH + STATUS_WIDTH + ETA_WIDTH;

/// Presentation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardOptions {
    pub progress_bar: bool,
    /// Characters between the brackets of a progress bar
    pub bar_width: usize,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            progress_bar: true,
            bar_width: 75,
        }
    }
}

/// One output line and how it should be highlighted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub severity: Severity,
}

impl Line {
    fn normal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Normal,
        }
    }
}

/// Context shown above the table
#[derive(Debug, Clone)]
pub struct Header<'a> {
    pub checked_at: DateTime<Local>,
    pub root: &'a Path,
    pub queue: &'a QueueState,
}

/// Renders the whole dashboard
pub fn render(
    header: &Header<'_>,
    summaries: &[GroupSummary],
    options: &DashboardOptions,
    terminal_width: usize,
) -> Vec<Line> {
    let mut lines = vec![Line::normal(format!(
        "Last check on {}",
        header.checked_at.format("%Y-%m-%dT%H:%M:%S")
    ))];

    match header.queue {
        QueueState::Live { listed, .. } => {
            lines.push(Line::normal(format!(
                "Watching {} ({} job(s) in queue)",
                header.root.display(),
                listed
            )));
        }
        QueueState::NotQueried => {
            lines.push(Line::normal(format!("Watching {}", header.root.display())));
        }
        QueueState::Unavailable { error, stale_since } => {
            lines.push(Line::normal(format!("Watching {}", header.root.display())));
            let text = match stale_since {
                Some(at) => format!(
                    "queue unavailable: {} (showing snapshot from {})",
                    error,
                    at.format("%H:%M:%S")
                ),
                None => format!("queue unavailable: {}", error),
            };
            lines.push(Line {
                text,
                severity: Severity::Error,
            });
        }
    }

    if summaries.is_empty() {
        lines.push(Line::normal(format!(
            "no run descriptors found under {}",
            header.root.display()
        )));
        return lines;
    }

    lines.push(Line::normal(format!(
        "{:<name$}{:<count$}{:<count$}{:<status$}{:<eta$}",
        "Directory",
        "Finished",
        "Total",
        "Status",
        "ETA (h)",
        name = NAME_WIDTH,
        count = COUNT_WIDTH,
        status = STATUS_WIDTH,
        eta = ETA_WIDTH,
    )));

    for summary in summaries {
        lines.extend(render_group(summary, options, terminal_width));
    }

    lines
}

/// Renders one group, with its bar on the same line when it fits
pub fn render_group(
    summary: &GroupSummary,
    options: &DashboardOptions,
    terminal_width: usize,
) -> Vec<Line> {
    let severity = summary.severity();
    let row = format!(
        "{:<name$}{:<count$}{:<count$}{:<status$}{:<eta$}",
        truncate(&summary.short_name(), NAME_WIDTH - 1),
        summary.finished_count,
        summary.job_count,
        truncate(&summary.status_label, STATUS_WIDTH - 1),
        format_eta(summary.eta_hours),
        name = NAME_WIDTH,
        count = COUNT_WIDTH,
        status = STATUS_WIDTH,
        eta = ETA_WIDTH,
    );

    if !options.progress_bar {
        return vec![Line { text: row, severity }];
    }

    let bar = progress_bar(summary.finished_count, summary.job_count, options.bar_width);
    if ROW_WIDTH + bar.chars().count() <= terminal_width {
        vec![Line {
            text: format!("{}{}", row, bar),
            severity,
        }]
    } else {
        vec![
            Line {
                text: row.trim_end().to_string(),
                severity,
            },
            Line {
                text: bar,
                severity,
            },
        ]
    }
}

/// ETA in hours with two decimals, `--` when unknown
pub fn format_eta(eta_hours: Option<f64>) -> String {
    match eta_hours {
        Some(hours) if hours.is_finite() => format!("{:.2}", hours),
        _ => "--".to_string(),
    }
}

/// ASCII bar such as `[xxxx------]` with `width` cells between the brackets
pub fn progress_bar(finished: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        ((width * finished) as f64 / total as f64).round() as usize
    }
    .min(width);

    format!("[{}{}]", "x".repeat(filled), "-".repeat(width - filled))
}

/// Writes rendered lines to a fresh screen
pub fn present(terminal: &mut dyn Terminal, lines: &[Line]) -> io::Result<()> {
    terminal.clear()?;
    for line in lines {
        terminal.write_line(&line.text, line.severity)?;
    }
    terminal.flush()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max.saturating_sub(1)).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn summary(name: &str, job_count: usize, finished_count: usize) -> GroupSummary {
        GroupSummary {
            group: PathBuf::from("/data").join(name),
            job_count,
            finished_count,
            has_crashed: false,
            average_runtime_seconds: None,
            eta_hours: None,
            status_label: "pending".to_string(),
        }
    }

    fn header(queue: &QueueState) -> Header<'_> {
        Header {
            checked_at: Local::now(),
            root: Path::new("/data"),
            queue,
        }
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(1, 2, 4), "[xx--]");
        assert_eq!(progress_bar(0, 3, 3), "[---]");
        assert_eq!(progress_bar(3, 3, 3), "[xxx]");
        assert_eq!(progress_bar(0, 0, 2), "[--]");

        let bar = progress_bar(1, 3, 75);
        assert_eq!(bar.matches('x').count(), 25);
        assert_eq!(bar.len(), 77);
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(Some(0.0)), "0.00");
        assert_eq!(format_eta(Some(100.0 / 3600.0)), "0.03");
        assert_eq!(format_eta(None), "--");
        assert_eq!(format_eta(Some(f64::NAN)), "--");
    }

    #[test]
    fn test_finished_group_row() {
        let mut done = summary("grpA", 5, 5);
        done.status_label = "FINISHED".to_string();
        done.eta_hours = Some(0.0);

        let options = DashboardOptions {
            progress_bar: false,
            bar_width: 75,
        };
        let lines = render_group(&done, &options, 200);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].severity, Severity::Complete);
        assert!(lines[0].text.starts_with("grpA"));
        assert!(lines[0].text.contains("FINISHED"));
        assert!(lines[0].text.contains("0.00"));
    }

    #[test]
    fn test_unknown_eta_never_prints_nan() {
        let lines = render_group(&summary("grpA", 3, 0), &DashboardOptions::default(), 200);
        assert!(lines[0].text.contains("--"));
        assert!(!lines[0].text.to_lowercase().contains("nan"));
    }

    #[test]
    fn test_bar_on_same_line_when_wide_enough() {
        let lines = render_group(&summary("grpA", 4, 2), &DashboardOptions::default(), 200);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text.ends_with(&format!("[{}{}]", "x".repeat(38), "-".repeat(37))));
    }

    #[test]
    fn test_bar_wraps_on_narrow_terminal() {
        let lines = render_group(&summary("grpA", 4, 2), &DashboardOptions::default(), 80);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].text.starts_with('['));
        assert_eq!(lines[0].severity, lines[1].severity);
    }

    #[test]
    fn test_crashed_group_is_error() {
        let mut crashed = summary("grpA", 4, 4);
        crashed.has_crashed = true;
        let lines = render_group(&crashed, &DashboardOptions::default(), 200);
        assert_eq!(lines[0].severity, Severity::Error);
    }

    #[test]
    fn test_long_names_are_truncated() {
        let long = "replica_exchange_temperature_scan_300K";
        let lines = render_group(
            &summary(long, 1, 0),
            &DashboardOptions {
                progress_bar: false,
                bar_width: 75,
            },
            200,
        );
        assert!(lines[0].text.starts_with("replica_exchange_temperature…"));
    }

    #[test]
    fn test_render_with_queue_unavailable() {
        let queue = QueueState::Unavailable {
            error: "timed out".to_string(),
            stale_since: None,
        };
        let lines = render(
            &header(&queue),
            &[summary("grpA", 2, 1)],
            &DashboardOptions::default(),
            200,
        );

        assert!(lines[0].text.starts_with("Last check on "));
        let marker = lines
            .iter()
            .find(|l| l.text.starts_with("queue unavailable"))
            .unwrap();
        assert_eq!(marker.severity, Severity::Error);
        assert!(lines.iter().any(|l| l.text.starts_with("Directory")));
        assert!(lines.last().unwrap().text.starts_with("grpA"));
    }

    #[test]
    fn test_render_without_jobs() {
        let queue = QueueState::NotQueried;
        let lines = render(&header(&queue), &[], &DashboardOptions::default(), 200);
        assert_eq!(
            lines.last().unwrap().text,
            "no run descriptors found under /data"
        );
    }
}
