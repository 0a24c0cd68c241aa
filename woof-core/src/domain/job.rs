//! Job domain types

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Identity of a single simulation job
///
/// A job is identified by the directory that groups it with its replicas and
/// the file name of its run descriptor inside that directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobIdentity {
    group: PathBuf,
    run_file: String,
}

impl JobIdentity {
    /// Creates an identity from a group directory and a run descriptor name
    pub fn new(group: impl Into<PathBuf>, run_file: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            run_file: run_file.into(),
        }
    }

    /// Builds an identity from the full path of a run descriptor
    ///
    /// Returns `None` when the path has no parent directory or no file name.
    pub fn from_descriptor_path(path: &Path) -> Option<Self> {
        let group = path.parent().filter(|p| !p.as_os_str().is_empty())?;
        let run_file = path.file_name()?.to_str()?;
        Some(Self::new(group, run_file))
    }

    /// Directory containing the job
    pub fn group(&self) -> &Path {
        &self.group
    }

    /// File name of the run descriptor
    pub fn run_file(&self) -> &str {
        &self.run_file
    }

    /// Last component of the group directory, used as the display name
    pub fn group_name(&self) -> String {
        group_short_name(&self.group)
    }

    /// Full path of the run descriptor
    pub fn descriptor_path(&self) -> PathBuf {
        self.group.join(&self.run_file)
    }

    /// Path of the completion artifact written next to the run descriptor
    ///
    /// The artifact shares the descriptor's base name. When the descriptor does
    /// not carry `run_suffix` the extension is replaced instead.
    pub fn artifact_path(&self, run_suffix: &str, artifact_suffix: &str) -> PathBuf {
        let base = match self.run_file.strip_suffix(run_suffix) {
            Some(stem) if !stem.is_empty() => stem.to_string(),
            _ => Path::new(&self.run_file)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.run_file.clone()),
        };
        self.group.join(format!("{}{}", base, artifact_suffix))
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor_path().display())
    }
}

/// Last path component of a group directory
pub fn group_short_name(group: &Path) -> String {
    group
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| group.display().to_string())
}

/// Removes `.` and `..` components without touching the filesystem
///
/// Symlinks are not resolved, so `link/..` collapses to the link's parent
/// directory as written. `..` at the root stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Job status as seen by the watchdog
///
/// `Unknown` is the state before the first check. `Pending` means no
/// completion artifact exists and the scheduler does not list the job.
/// `Scheduler` carries the state string reported by the queue verbatim.
/// `Finished` and `Crashed` are derived from the completion artifact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Unknown,
    Pending,
    Scheduler(String),
    Finished,
    Crashed,
}

impl JobStatus {
    /// Whether the job completed successfully
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Finished)
    }

    /// Whether the job left an artifact without the success sentinel
    pub fn is_crashed(&self) -> bool {
        matches!(self, JobStatus::Crashed)
    }

    /// Display label
    pub fn label(&self) -> &str {
        match self {
            JobStatus::Unknown => "unknown",
            JobStatus::Pending => "pending",
            JobStatus::Scheduler(state) => state,
            JobStatus::Finished => "finished",
            JobStatus::Crashed => "crashed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-job row of the status table
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub identity: JobIdentity,
    pub status: JobStatus,
    /// Scheduler job ID, known once the job has shown up in a queue snapshot
    pub job_id: Option<String>,
    /// Runtime reported by the completion artifact, only set for finished jobs
    pub runtime_seconds: Option<f64>,
}

impl JobRecord {
    /// Creates a record that has not been checked yet
    pub fn new(identity: JobIdentity) -> Self {
        Self {
            identity,
            status: JobStatus::Unknown,
            job_id: None,
            runtime_seconds: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path_replaces_run_suffix() {
        let id = JobIdentity::new("/data/grpA", "sim1.run");
        assert_eq!(
            id.artifact_path(".run", ".omd"),
            PathBuf::from("/data/grpA/sim1.omd")
        );
    }

    #[test]
    fn test_artifact_path_keeps_inner_dots() {
        let id = JobIdentity::new("/data/grpA", "eq.step2.run");
        assert_eq!(
            id.artifact_path(".run", ".omd"),
            PathBuf::from("/data/grpA/eq.step2.omd")
        );
    }

    #[test]
    fn test_artifact_path_without_run_suffix_uses_stem() {
        let id = JobIdentity::new("/data/grpA", "sim1.job");
        assert_eq!(
            id.artifact_path(".run", ".omd"),
            PathBuf::from("/data/grpA/sim1.omd")
        );
    }

    #[test]
    fn test_from_descriptor_path() {
        let id = JobIdentity::from_descriptor_path(Path::new("/root/grpA/sim1.run")).unwrap();
        assert_eq!(id.group(), Path::new("/root/grpA"));
        assert_eq!(id.run_file(), "sim1.run");
        assert_eq!(id.group_name(), "grpA");

        assert!(JobIdentity::from_descriptor_path(Path::new("sim1.run")).is_none());
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/x/b/../a/./grpA")),
            PathBuf::from("/x/a/grpA")
        );
        assert_eq!(normalize_lexically(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize_lexically(Path::new("../x/..")), PathBuf::from(".."));
        assert_eq!(normalize_lexically(Path::new("a/..")), PathBuf::from("."));
        assert_eq!(normalize_lexically(Path::new("/data/grpA")), PathBuf::from("/data/grpA"));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(JobStatus::default(), JobStatus::Unknown);
        assert_eq!(JobStatus::Pending.to_string(), "pending");
        assert_eq!(
            JobStatus::Scheduler("RUNNING".to_string()).to_string(),
            "RUNNING"
        );
        assert!(JobStatus::Finished.is_finished());
        assert!(!JobStatus::Crashed.is_finished());
        assert!(JobStatus::Crashed.is_crashed());
    }

    #[test]
    fn test_new_record_is_unchecked() {
        let record = JobRecord::new(JobIdentity::new("/data/grpA", "sim1.run"));
        assert_eq!(record.status, JobStatus::Unknown);
        assert!(record.job_id.is_none());
        assert!(record.runtime_seconds.is_none());
    }
}
