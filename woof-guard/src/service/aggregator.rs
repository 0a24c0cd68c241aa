//! Group aggregation
//!
//! Rolls the per-job records up into one summary per group directory.

use std::collections::HashMap;
use std::path::Path;
use woof_core::domain::group::{FINISHED_LABEL, GroupSummary};
use woof_core::domain::job::JobRecord;

use crate::store::JobStore;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Summarizes the store, one entry per group in order of first appearance
pub fn summarize(store: &JobStore) -> Vec<GroupSummary> {
    let mut order: Vec<&Path> = Vec::new();
    let mut members: HashMap<&Path, Vec<&JobRecord>> = HashMap::new();

    for record in store.iter() {
        let group = record.identity.group();
        members
            .entry(group)
            .or_insert_with(|| {
                order.push(group);
                Vec::new()
            })
            .push(record);
    }

    order
        .into_iter()
        .map(|group| summarize_group(group, &members[group]))
        .collect()
}

/// Summarizes the members of one group, given in store order
pub fn summarize_group(group: &Path, records: &[&JobRecord]) -> GroupSummary {
    let job_count = records.len();
    let finished: Vec<&&JobRecord> = records.iter().filter(|r| r.status.is_finished()).collect();
    let finished_count = finished.len();
    let has_crashed = records.iter().any(|r| r.status.is_crashed());

    let runtimes: Vec<f64> = finished
        .iter()
        .filter_map(|r| r.runtime_seconds)
        .filter(|value| value.is_finite())
        .collect();
    let average_runtime_seconds = mean(&runtimes);

    let remaining = job_count - finished_count;
    let eta_hours = if remaining == 0 {
        Some(0.0)
    } else {
        average_runtime_seconds.map(|avg| remaining as f64 * avg / SECONDS_PER_HOUR)
    };

    // The first unfinished member in store order speaks for the group.
    let status_label = match records.iter().find(|r| !r.status.is_finished()) {
        Some(record) => record.status.label().to_string(),
        None if job_count > 0 => FINISHED_LABEL.to_string(),
        None => String::new(),
    };

    GroupSummary {
        group: group.to_path_buf(),
        job_count,
        finished_count,
        has_crashed,
        average_runtime_seconds,
        eta_hours,
        status_label,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use woof_core::domain::job::{JobIdentity, JobStatus};

    fn store_with(groups: &[(&str, usize)]) -> JobStore {
        JobStore::new(groups.iter().flat_map(|(group, count)| {
            (1..=*count).map(move |i| JobIdentity::new(*group, format!("sim{}.run", i)))
        }))
    }

    fn id(group: &str, i: usize) -> JobIdentity {
        JobIdentity::new(group, format!("sim{}.run", i))
    }

    #[test]
    fn test_all_finished_group() {
        let mut store = store_with(&[("/data/grpA", 5)]);
        for i in 1..=5 {
            store.mark_finished(&id("/data/grpA", i), Some(100.0 * i as f64));
        }

        let groups = summarize(&store);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].status_label, "FINISHED");
        assert_eq!(groups[0].finished_count, 5);
        assert_eq!(groups[0].eta_hours, Some(0.0));
        assert_eq!(groups[0].average_runtime_seconds, Some(300.0));
        assert!(groups[0].is_complete());
    }

    #[test]
    fn test_all_finished_without_runtimes_has_zero_eta() {
        let mut store = store_with(&[("/data/grpA", 2)]);
        store.mark_finished(&id("/data/grpA", 1), None);
        store.mark_finished(&id("/data/grpA", 2), None);

        let groups = summarize(&store);
        assert_eq!(groups[0].average_runtime_seconds, None);
        assert_eq!(groups[0].eta_hours, Some(0.0));
    }

    #[test]
    fn test_no_finished_members_gives_unknown_eta() {
        let mut store = store_with(&[("/data/grpA", 3)]);
        store.set_status(&id("/data/grpA", 1), JobStatus::Pending);

        let groups = summarize(&store);
        assert_eq!(groups[0].finished_count, 0);
        assert_eq!(groups[0].average_runtime_seconds, None);
        assert_eq!(groups[0].eta_hours, None);
    }

    #[test]
    fn test_eta_uses_mean_of_known_runtimes() {
        let mut store = store_with(&[("/data/grpA", 4)]);
        store.mark_finished(&id("/data/grpA", 1), Some(3600.0));
        store.mark_finished(&id("/data/grpA", 2), Some(7200.0));
        store.mark_finished(&id("/data/grpA", 3), None);

        let groups = summarize(&store);
        assert_eq!(groups[0].average_runtime_seconds, Some(5400.0));
        assert_eq!(groups[0].eta_hours, Some(1.5));
    }

    #[test]
    fn test_label_is_first_unfinished_member() {
        let mut store = store_with(&[("/data/grpA", 3)]);
        store.mark_finished(&id("/data/grpA", 1), Some(10.0));
        store.set_queue_state(&id("/data/grpA", 2), "78", "RUNNING");
        store.set_status(&id("/data/grpA", 3), JobStatus::Crashed);

        let groups = summarize(&store);
        assert_eq!(groups[0].status_label, "RUNNING");
        assert!(groups[0].has_crashed);
    }

    #[test]
    fn test_groups_keep_store_order() {
        let store = store_with(&[("/data/grp2", 1), ("/data/grp10", 2), ("/data/grp1", 1)]);

        let names: Vec<String> = summarize(&store).iter().map(|g| g.short_name()).collect();
        assert_eq!(names, vec!["grp2", "grp10", "grp1"]);
    }

    #[test]
    fn test_unchecked_group_reports_unknown() {
        let store = store_with(&[("/data/grpA", 2)]);
        let groups = summarize(&store);
        assert_eq!(groups[0].status_label, "unknown");
        assert_eq!(groups[0].job_count, 2);
    }

    #[test]
    fn test_empty_store() {
        assert!(summarize(&JobStore::new(Vec::new())).is_empty());
    }
}
