//! Completion artifact inspection
//!
//! A finished simulation leaves an output file next to its run descriptor.
//! Only the last few lines are read: they carry the success sentinel and the
//! total time used.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use woof_core::domain::job::JobIdentity;

/// Size of the blocks read backwards from the end of an artifact
const TAIL_CHUNK: u64 = 4096;

/// How run descriptors and their artifacts look on disk
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRules {
    /// Suffix of run descriptor files (e.g. `.run`)
    pub run_suffix: String,
    /// Suffix of the completion artifact (e.g. `.omd`)
    pub artifact_suffix: String,
    /// Line printed by the simulation when it ended successfully
    pub sentinel: String,
    /// Prefixes of lines reporting the total runtime in seconds
    pub runtime_labels: Vec<String>,
    /// Number of trailing lines inspected
    pub tail_lines: usize,
}

impl Default for ArtifactRules {
    fn default() -> Self {
        Self {
            run_suffix: ".run".to_string(),
            artifact_suffix: ".omd".to_string(),
            sentinel: "MD++ finished successfully".to_string(),
            runtime_labels: vec![
                "Overall time used".to_string(),
                "Total time used".to_string(),
                "Time used".to_string(),
            ],
            tail_lines: 10,
        }
    }
}

/// What the filesystem says about a job
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactState {
    /// No artifact yet
    Missing,
    /// The artifact exists but could not be read (e.g. mid-write, permissions)
    Unreadable(String),
    /// Sentinel present
    Finished { runtime_seconds: Option<f64> },
    /// Artifact present without the sentinel
    Crashed,
}

/// Inspects the completion artifact of `identity`
pub fn inspect(identity: &JobIdentity, rules: &ArtifactRules) -> ArtifactState {
    let path = identity.artifact_path(&rules.run_suffix, &rules.artifact_suffix);

    match read_tail(&path, rules.tail_lines) {
        Ok(lines) => evaluate_tail(&lines, rules),
        Err(e) if e.kind() == io::ErrorKind::NotFound => ArtifactState::Missing,
        Err(e) => ArtifactState::Unreadable(format!("{}: {}", path.display(), e)),
    }
}

/// Classifies an artifact from its trailing lines
pub fn evaluate_tail(lines: &[String], rules: &ArtifactRules) -> ArtifactState {
    let succeeded = lines
        .iter()
        .any(|line| line.trim_end() == rules.sentinel);

    if succeeded {
        ArtifactState::Finished {
            runtime_seconds: parse_runtime(lines, &rules.runtime_labels),
        }
    } else {
        ArtifactState::Crashed
    }
}

/// Extracts the runtime in seconds from label lines
///
/// A label line starts (after indentation) with one of `labels`, followed by
/// an optional colon and a single value. Per-step timers such as
/// `Time used for pairlist: 10.0` carry more words and are not label lines.
/// When several label lines parse, the last one wins.
pub fn parse_runtime(lines: &[String], labels: &[String]) -> Option<f64> {
    lines
        .iter()
        .filter_map(|line| {
            let line = line.trim_start();
            labels
                .iter()
                .find_map(|label| label_value(line, label))?
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
        })
        .last()
}

// The value of `line` if it is exactly `label[:] value`.
fn label_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(label)?;
    if !rest.is_empty() && !rest.starts_with(|c: char| c == ':' || c.is_whitespace()) {
        return None;
    }

    let rest = rest.trim_start();
    let rest = rest.strip_prefix(':').unwrap_or(rest);

    let mut tokens = rest.split_whitespace();
    let value = tokens.next()?;
    tokens.next().is_none().then_some(value)
}

/// Reads the last `count` lines of a file without loading all of it
pub fn read_tail(path: &Path, count: usize) -> io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let metadata = file.metadata()?;

    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }

    let mut start = metadata.len();
    let mut buffer: Vec<u8> = Vec::new();

    // Grow the window backwards until it holds more line breaks than lines
    // wanted, so the oldest line in it is known to be complete.
    while start > 0 && bytecount_newlines(&buffer) <= count {
        let step = TAIL_CHUNK.min(start);
        start -= step;

        let mut chunk = vec![0u8; step as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut chunk)?;

        chunk.extend_from_slice(&buffer);
        buffer = chunk;
    }

    let text = String::from_utf8_lossy(&buffer);
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(count);

    Ok(lines[skip..].iter().map(|l| l.to_string()).collect())
}

fn bytecount_newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_runtime_parsed_from_label() {
        let rules = ArtifactRules::default();
        let tail = lines(&["Overall time used: 123.4", "MD++ finished successfully"]);

        assert_eq!(
            evaluate_tail(&tail, &rules),
            ArtifactState::Finished {
                runtime_seconds: Some(123.4)
            }
        );
    }

    #[test]
    fn test_missing_sentinel_is_crash() {
        let rules = ArtifactRules::default();
        let tail = lines(&["Overall time used: 123.4"]);

        assert_eq!(evaluate_tail(&tail, &rules), ArtifactState::Crashed);
    }

    #[test]
    fn test_sentinel_without_runtime() {
        let rules = ArtifactRules::default();
        let tail = lines(&["MD++ finished successfully"]);

        assert_eq!(
            evaluate_tail(&tail, &rules),
            ArtifactState::Finished {
                runtime_seconds: None
            }
        );
    }

    #[test]
    fn test_last_label_line_wins() {
        let labels = ArtifactRules::default().runtime_labels;
        let tail = lines(&[
            "OVERALL",
            "    Overall time used:     2500.75",
            "    Total time used      3000",
        ]);

        assert_eq!(parse_runtime(&tail, &labels), Some(3000.0));
    }

    #[test]
    fn test_step_timers_do_not_override_total() {
        let labels = ArtifactRules::default().runtime_labels;
        let tail = lines(&[
            "    Overall time used:     2500.75",
            "  Time used for pairlist:    10.0",
            "  Time usedx: 7",
        ]);

        assert_eq!(parse_runtime(&tail, &labels), Some(2500.75));
        assert_eq!(parse_runtime(&lines(&["Time used: 12.5"]), &labels), Some(12.5));
    }

    #[test]
    fn test_unparsable_label_line_is_ignored() {
        let labels = ArtifactRules::default().runtime_labels;
        let tail = lines(&["Overall time used: 42", "Total time used: n/a"]);

        assert_eq!(parse_runtime(&tail, &labels), Some(42.0));
    }

    #[test]
    fn test_read_tail_returns_last_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sim1.omd");
        let content: String = (1..=100).map(|i| format!("line {}\n", i)).collect();
        fs::write(&path, content).unwrap();

        let tail = read_tail(&path, 3).unwrap();
        assert_eq!(tail, lines(&["line 98", "line 99", "line 100"]));
    }

    #[test]
    fn test_read_tail_across_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sim1.omd");
        let long = "x".repeat(10_000);
        fs::write(&path, format!("{}\nsecond\nthird", long)).unwrap();

        let tail = read_tail(&path, 3).unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].len(), 10_000);
        assert_eq!(tail[2], "third");
    }

    #[test]
    fn test_read_tail_short_and_empty_files() {
        let dir = TempDir::new().unwrap();
        let short = dir.path().join("short.omd");
        let empty = dir.path().join("empty.omd");
        fs::write(&short, "only\n").unwrap();
        fs::write(&empty, "").unwrap();

        assert_eq!(read_tail(&short, 10).unwrap(), lines(&["only"]));
        assert!(read_tail(&empty, 10).unwrap().is_empty());
    }

    #[test]
    fn test_inspect_states() {
        let dir = TempDir::new().unwrap();
        let rules = ArtifactRules::default();
        let group = dir.path().join("grpA");
        fs::create_dir(&group).unwrap();

        let done = JobIdentity::new(&group, "sim1.run");
        fs::write(
            group.join("sim1.omd"),
            "...\nOverall time used: 100\nMD++ finished successfully\n",
        )
        .unwrap();

        let crashed = JobIdentity::new(&group, "sim2.run");
        fs::write(group.join("sim2.omd"), "...\nSegmentation fault\n").unwrap();

        let waiting = JobIdentity::new(&group, "sim3.run");

        let broken = JobIdentity::new(&group, "sim4.run");
        fs::create_dir(group.join("sim4.omd")).unwrap();

        assert_eq!(
            inspect(&done, &rules),
            ArtifactState::Finished {
                runtime_seconds: Some(100.0)
            }
        );
        assert_eq!(inspect(&crashed, &rules), ArtifactState::Crashed);
        assert_eq!(inspect(&waiting, &rules), ArtifactState::Missing);
        assert!(matches!(
            inspect(&broken, &rules),
            ArtifactState::Unreadable(_)
        ));
    }
}
