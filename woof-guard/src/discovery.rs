//! Job discovery
//!
//! Walks the watched root once at startup and collects every run descriptor.
//! The resulting identity set is fixed for the lifetime of the process.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use woof_core::domain::job::{JobIdentity, normalize_lexically};
use woof_core::natural::natural_path_cmp;

/// Resolves the watched root to an absolute path without `.` or `..`
///
/// Symlinks are kept as given: the scheduler reports the paths jobs were
/// submitted with, which usually go through the same links.
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(root)
        .map(|path| normalize_lexically(&path))
        .with_context(|| format!("Failed to resolve root path {}", root.display()))?;

    std::fs::read_dir(&absolute)
        .with_context(|| format!("Failed to read root path {}", absolute.display()))?;

    Ok(absolute)
}

/// Finds all run descriptors below `root`, in natural path order
///
/// Fails only when the root itself cannot be read; unreadable subdirectories
/// are logged and skipped.
pub fn discover_jobs(root: &Path, run_suffix: &str) -> Result<Vec<JobIdentity>> {
    let root = resolve_root(root)?;
    info!("Scanning {} for *{} files", root.display(), run_suffix);

    let mut descriptors = Vec::new();

    for entry in WalkDir::new(&root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry during discovery: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let is_descriptor = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.len() > run_suffix.len() && name.ends_with(run_suffix));

        if is_descriptor {
            debug!("Found run descriptor {}", entry.path().display());
            descriptors.push(entry.into_path());
        }
    }

    descriptors.sort_by(|a, b| natural_path_cmp(a, b));
    descriptors.dedup();

    let identities: Vec<JobIdentity> = descriptors
        .iter()
        .filter_map(|path| JobIdentity::from_descriptor_path(path))
        .collect();

    info!("Discovered {} job(s)", identities.len());
    Ok(identities)
}
