//! Metrics sink for merge diagnostics.
//!
//! The merge reports through `MetricsSinkTrait`; `MergeCounters` keeps the
//! numbers in memory and `NoopMetrics` drops them.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::metrics::{MergeSizeBucket, RemoteUpdateError, UuidDuplicateKind};

pub const PROBLEMATIC_UPDATE_HISTOGRAM: &str = "Sync.ProblematicServerSideBookmarksDuringMerge";
pub const UUID_DUPLICATES_HISTOGRAM: &str = "Sync.BookmarksGUIDDuplicates";
pub const VALID_INPUT_UPDATES_HISTOGRAM: &str = "Sync.BookmarkModelMerger.ValidInputUpdates";
pub const REACHABLE_INPUT_UPDATES_HISTOGRAM: &str =
    "Sync.BookmarkModelMerger.ReachableInputUpdates";
pub const UNSYNCED_UPON_COMPLETION_HISTOGRAM: &str =
    "Sync.BookmarkModelMerger.UnsyncedEntitiesUponCompletion";
pub const MERGE_TIME_HISTOGRAM: &str = "Sync.BookmarkModelMergerTime";

/// Receives merge diagnostics.
pub trait MetricsSinkTrait {
    fn record_problematic_update(&mut self, problem: RemoteUpdateError);
    fn record_uuid_duplicate(&mut self, kind: UuidDuplicateKind);
    fn record_valid_input_updates(&mut self, count: usize);
    fn record_reachable_input_updates(&mut self, count: usize);
    fn record_unsynced_upon_completion(&mut self, count: usize);
    /// Valid remote records skipped because they sit below the depth cap.
    fn record_beyond_depth_limit(&mut self, count: usize);
    fn record_merge_time(&mut self, bucket: MergeSizeBucket, elapsed: Duration);
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSinkTrait for NoopMetrics {
    fn record_problematic_update(&mut self, _problem: RemoteUpdateError) {}
    fn record_uuid_duplicate(&mut self, _kind: UuidDuplicateKind) {}
    fn record_valid_input_updates(&mut self, _count: usize) {}
    fn record_reachable_input_updates(&mut self, _count: usize) {}
    fn record_unsynced_upon_completion(&mut self, _count: usize) {}
    fn record_beyond_depth_limit(&mut self, _count: usize) {}
    fn record_merge_time(&mut self, _bucket: MergeSizeBucket, _elapsed: Duration) {}
}

/// In-memory counters, one field per histogram plus the depth-cap overflow.
#[derive(Debug, Default, Clone)]
pub struct MergeCounters {
    pub problematic_updates: BTreeMap<RemoteUpdateError, usize>,
    pub uuid_duplicates: BTreeMap<UuidDuplicateKind, usize>,
    pub valid_input_updates: Option<usize>,
    pub reachable_input_updates: Option<usize>,
    pub unsynced_upon_completion: Option<usize>,
    pub beyond_depth_limit: Option<usize>,
    pub merge_times: Vec<(MergeSizeBucket, Duration)>,
}

impl MergeCounters {
    pub fn problem_count(&self, problem: RemoteUpdateError) -> usize {
        self.problematic_updates.get(&problem).copied().unwrap_or(0)
    }

    pub fn total_problems(&self) -> usize {
        self.problematic_updates.values().sum()
    }

    pub fn duplicate_count(&self, kind: UuidDuplicateKind) -> usize {
        self.uuid_duplicates.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_duplicates(&self) -> usize {
        self.uuid_duplicates.values().sum()
    }

    /// Histogram names this sink has samples for, with the merge time split by size.
    pub fn recorded_histograms(&self) -> Vec<String> {
        let mut names = Vec::new();
        if !self.problematic_updates.is_empty() {
            names.push(PROBLEMATIC_UPDATE_HISTOGRAM.to_string());
        }
        if !self.uuid_duplicates.is_empty() {
            names.push(UUID_DUPLICATES_HISTOGRAM.to_string());
        }
        if self.valid_input_updates.is_some() {
            names.push(VALID_INPUT_UPDATES_HISTOGRAM.to_string());
        }
        if self.reachable_input_updates.is_some() {
            names.push(REACHABLE_INPUT_UPDATES_HISTOGRAM.to_string());
        }
        if self.unsynced_upon_completion.is_some() {
            names.push(UNSYNCED_UPON_COMPLETION_HISTOGRAM.to_string());
        }
        for (bucket, _) in &self.merge_times {
            names.push(format!("{}{}", MERGE_TIME_HISTOGRAM, bucket.histogram_suffix()));
        }
        names
    }
}

impl MetricsSinkTrait for MergeCounters {
    fn record_problematic_update(&mut self, problem: RemoteUpdateError) {
        *self.problematic_updates.entry(problem).or_insert(0) += 1;
    }

    fn record_uuid_duplicate(&mut self, kind: UuidDuplicateKind) {
        *self.uuid_duplicates.entry(kind).or_insert(0) += 1;
    }

    fn record_valid_input_updates(&mut self, count: usize) {
        self.valid_input_updates = Some(count);
    }

    fn record_reachable_input_updates(&mut self, count: usize) {
        self.reachable_input_updates = Some(count);
    }

    fn record_unsynced_upon_completion(&mut self, count: usize) {
        self.unsynced_upon_completion = Some(count);
    }

    fn record_beyond_depth_limit(&mut self, count: usize) {
        self.beyond_depth_limit = Some(count);
    }

    fn record_merge_time(&mut self, bucket: MergeSizeBucket, elapsed: Duration) {
        self.merge_times.push((bucket, elapsed));
    }
}
