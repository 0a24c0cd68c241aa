//! Scheduler queue snapshots
//!
//! The scheduler is asked for a delimited listing with one job per line:
//! `job_id,state,command`. The first line is a header. Only those three
//! columns are relied upon; anything after the run descriptor path in the
//! command column, extra delimited fields included, is ignored.

use chrono::{DateTime, Local};
use std::path::Path;
use thiserror::Error;

use crate::domain::job::{JobIdentity, normalize_lexically};

/// Default column delimiter of the queue listing
pub const DEFAULT_DELIMITER: char = ',';

/// One job listed by the scheduler that maps to a run descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub job_id: String,
    pub state: String,
    pub identity: JobIdentity,
}

/// Reasons a queue row could not be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("missing {0} column")]
    MissingField(&'static str),

    #[error("empty {0} column")]
    EmptyField(&'static str),

    #[error("command '{0}' is not an absolute path to a run descriptor")]
    UnusableCommand(String),
}

/// A row that was skipped while parsing a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line number in the raw output, header included
    pub line: usize,
    pub error: RowError,
}

/// Point-in-time view of the scheduler queue
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub entries: Vec<QueueEntry>,
    pub skipped: Vec<SkippedRow>,
    pub taken_at: DateTime<Local>,
}

impl QueueSnapshot {
    /// Parses the raw output of the queue command
    ///
    /// The first line is discarded as the header and blank lines are ignored.
    /// Malformed rows are collected in `skipped` instead of failing the parse.
    pub fn parse(output: &str, delimiter: char, taken_at: DateTime<Local>) -> Self {
        let mut entries = Vec::new();
        let mut skipped = Vec::new();

        for (index, raw) in output.lines().enumerate().skip(1) {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            match parse_row(line, delimiter) {
                Ok(entry) => entries.push(entry),
                Err(error) => skipped.push(SkippedRow {
                    line: index + 1,
                    error,
                }),
            }
        }

        Self {
            entries,
            skipped,
            taken_at,
        }
    }
}

/// Parses a single `job_id,state,command` row
///
/// The run descriptor path is the leading token of the command column, cut at
/// the first whitespace or delimiter; trailing arguments and extra fields are
/// ignored.
pub fn parse_row(line: &str, delimiter: char) -> Result<QueueEntry, RowError> {
    let mut fields = line.splitn(3, delimiter);

    let job_id = required_field(fields.next(), "job id")?;
    let state = required_field(fields.next(), "state")?;
    let command = required_field(fields.next(), "command")?;

    let path = command
        .split(|c: char| c.is_whitespace() || c == delimiter)
        .next()
        .filter(|token| !token.is_empty())
        .ok_or(RowError::EmptyField("command"))?;

    let path = Path::new(path);
    if !path.is_absolute() {
        return Err(RowError::UnusableCommand(command.to_string()));
    }

    let identity = JobIdentity::from_descriptor_path(&normalize_lexically(path))
        .ok_or_else(|| RowError::UnusableCommand(command.to_string()))?;

    Ok(QueueEntry {
        job_id: job_id.to_string(),
        state: state.to_string(),
        identity,
    })
}

fn required_field<'a>(field: Option<&'a str>, name: &'static str) -> Result<&'a str, RowError> {
    let field = field.ok_or(RowError::MissingField(name))?.trim();
    if field.is_empty() {
        return Err(RowError::EmptyField(name));
    }
    Ok(field)
}
