// ── Availability reconciler ──
//
// Turns point-in-time samples into outbound reports. Each tracked resource
// keeps its last known status and its most recent sample; a status change
// marks the resource for the next changes-only report.
//
// Recorders hold the cycle gate shared, so they interleave freely (the
// per-resource entry lives in a DashMap shard). A report build holds the
// gate exclusively while it drains the changed marks and reads the latest
// samples, so every sample lands in exactly one changes-only report.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::Utc;
use dashmap::DashMap;
use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{AvailabilityReport, AvailabilitySample, AvailabilityStatus, ResourceId};

#[derive(Debug, Clone, Copy, Default)]
struct Tracked {
    /// `None` until first sampled or restored.
    last_known: Option<AvailabilityStatus>,
    latest: Option<AvailabilitySample>,
}

pub struct AvailabilityReconciler {
    origin_id: String,
    entries: DashMap<ResourceId, Tracked>,
    changed: Mutex<IndexSet<ResourceId>>,
    gate: RwLock<()>,
}

impl AvailabilityReconciler {
    pub fn new(origin_id: impl Into<String>) -> Self {
        Self {
            origin_id: origin_id.into(),
            entries: DashMap::new(),
            changed: Mutex::new(IndexSet::new()),
            gate: RwLock::new(()),
        }
    }

    pub fn origin_id(&self) -> &str {
        &self.origin_id
    }

    // ── Tracked set ──────────────────────────────────────────────────

    /// Start tracking a resource with no known status. No-op if tracked.
    pub fn track(&self, id: ResourceId) {
        self.entries.entry(id).or_default();
    }

    /// Start tracking a resource whose last status is known (from a
    /// persisted snapshot). Overwrites any existing baseline.
    pub fn track_with_status(&self, id: ResourceId, status: AvailabilityStatus) {
        self.entries.entry(id).or_default().last_known = Some(status);
    }

    pub fn untrack(&self, id: ResourceId) {
        let _cycle = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.entries.remove(&id);
        self.changed_marks().shift_remove(&id);
    }

    /// Drop every tracked resource for which `keep` returns false.
    pub fn retain(&self, keep: impl Fn(ResourceId) -> bool) {
        let _cycle = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.entries.retain(|id, _| keep(*id));
        self.changed_marks().retain(|id| keep(*id));
    }

    pub fn is_tracked(&self, id: ResourceId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn tracked_len(&self) -> usize {
        self.entries.len()
    }

    /// Last status recorded or restored for a resource.
    pub fn last_known(&self, id: ResourceId) -> Option<AvailabilityStatus> {
        self.entries.get(&id).and_then(|e| e.last_known)
    }

    /// Every known baseline, for persisting alongside the inventory.
    pub fn last_known_statuses(&self) -> HashMap<ResourceId, AvailabilityStatus> {
        self.entries
            .iter()
            .filter_map(|e| e.last_known.map(|s| (*e.key(), s)))
            .collect()
    }

    /// Resources currently marked as changed this cycle.
    pub fn pending_changes(&self) -> usize {
        self.changed_marks().len()
    }

    // ── Samples ──────────────────────────────────────────────────────

    /// Record a probe sample. Returns whether the status changed.
    ///
    /// Samples for untracked resources are rejected; dropping them would
    /// let a report look complete while missing data.
    pub fn record_sample(&self, sample: AvailabilitySample) -> Result<bool, CoreError> {
        let _cycle = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        let Some(mut entry) = self.entries.get_mut(&sample.resource_id) else {
            warn!(resource_id = %sample.resource_id, "availability sample for unknown resource rejected");
            return Err(CoreError::UnknownResource {
                id: sample.resource_id,
            });
        };

        let changed = entry.last_known != Some(sample.status);
        entry.latest = Some(sample);
        if changed {
            debug!(resource_id = %sample.resource_id, from = ?entry.last_known, to = %sample.status, "availability changed");
            entry.last_known = Some(sample.status);
            self.changed_marks().insert(sample.resource_id);
        }
        Ok(changed)
    }

    /// Convenience wrapper over [`record_sample`](Self::record_sample).
    pub fn record(
        &self,
        id: ResourceId,
        timestamp_millis: i64,
        status: AvailabilityStatus,
    ) -> Result<bool, CoreError> {
        self.record_sample(AvailabilitySample::new(id, timestamp_millis, status))
    }

    // ── Reports ──────────────────────────────────────────────────────

    /// Build the next outbound report and reset the changed marks.
    ///
    /// Changes-only reports carry one sample per resource marked since the
    /// last build, in marking order. Full reports carry exactly one sample
    /// per tracked resource. A resource with no sample this session is
    /// reported at its restored baseline, or `UNKNOWN` without one, and the
    /// emitted status becomes its baseline.
    pub fn build_report(&self, changes_only: bool) -> AvailabilityReport {
        let _cycle = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        let marked = std::mem::take(&mut *self.changed_marks());
        let mut report = AvailabilityReport::new(&self.origin_id, changes_only);

        if changes_only {
            report.samples = marked
                .into_iter()
                .filter_map(|id| self.entries.get(&id).and_then(|e| e.latest))
                .collect();
        } else {
            let now = Utc::now().timestamp_millis();
            report.samples = self
                .entries
                .iter_mut()
                .map(|mut e| {
                    let id = *e.key();
                    let baseline = e.last_known.unwrap_or_default();
                    let sample = e
                        .latest
                        .unwrap_or_else(|| AvailabilitySample::new(id, now, baseline));
                    // The receiver now holds this status; later samples diff against it.
                    e.last_known = Some(sample.status);
                    sample
                })
                .collect();
            report.samples.sort_by_key(|s| s.resource_id);
        }

        info!(report = %report, "availability report built");
        report
    }

    fn changed_marks(&self) -> std::sync::MutexGuard<'_, IndexSet<ResourceId>> {
        self.changed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AvailabilityReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityReconciler")
            .field("origin_id", &self.origin_id)
            .field("tracked", &self.entries.len())
            .field("pending_changes", &self.pending_changes())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use pretty_assertions::assert_eq;
    use AvailabilityStatus::{Down, Unknown, Up};

    fn ids(report: &AvailabilityReport) -> Vec<ResourceId> {
        report.samples.iter().map(|s| s.resource_id).collect()
    }

    #[test]
    fn identical_samples_do_not_repeat_in_changes_only() {
        let rec = AvailabilityReconciler::new("agent");
        let id = ResourceId::new();
        rec.track(id);

        assert!(rec.record(id, 1, Up).unwrap());
        assert!(!rec.record(id, 2, Up).unwrap());
        let first = rec.build_report(true);
        assert_eq!(first.len(), 1);
        // Most recent sample wins, not the one that caused the change.
        assert_eq!(first.samples[0].timestamp_millis, 2);

        rec.record(id, 3, Up).unwrap();
        assert!(rec.build_report(true).is_empty());

        rec.record(id, 4, Down).unwrap();
        let third = rec.build_report(true);
        assert_eq!(ids(&third), vec![id]);
        assert_eq!(third.samples[0].status, Down);

        rec.record(id, 5, Down).unwrap();
        assert!(rec.build_report(true).is_empty());
    }

    #[test]
    fn first_sample_counts_as_change_even_if_unknown() {
        let rec = AvailabilityReconciler::new("agent");
        let id = ResourceId::new();
        rec.track(id);
        assert!(rec.record(id, 1, Unknown).unwrap());
        assert_eq!(rec.pending_changes(), 1);
    }

    #[test]
    fn restored_baseline_suppresses_unchanged_first_sample() {
        let rec = AvailabilityReconciler::new("agent");
        let id = ResourceId::new();
        rec.track_with_status(id, Up);

        assert!(!rec.record(id, 1, Up).unwrap());
        assert!(rec.build_report(true).is_empty());
    }

    #[test]
    fn full_report_has_one_sample_per_tracked_resource() {
        let rec = AvailabilityReconciler::new("agent");
        let sampled = ResourceId::new();
        let silent = ResourceId::new();
        rec.track(sampled);
        rec.track(silent);

        rec.record(sampled, 10, Up).unwrap();
        rec.record(sampled, 11, Down).unwrap();
        rec.record(sampled, 12, Up).unwrap();

        let full = rec.build_report(false);
        assert!(!full.changes_only);
        assert_eq!(full.len(), 2);
        let silent_sample = full.samples.iter().find(|s| s.resource_id == silent).unwrap();
        assert_eq!(silent_sample.status, Unknown);
        let sampled_sample = full.samples.iter().find(|s| s.resource_id == sampled).unwrap();
        assert_eq!(sampled_sample.timestamp_millis, 12);

        // A full report resets the changes-only baseline.
        assert!(rec.build_report(true).is_empty());
    }

    #[test]
    fn full_report_uses_restored_baseline_for_unsampled() {
        let rec = AvailabilityReconciler::new("agent");
        let (restored, fresh) = (ResourceId::new(), ResourceId::new());
        rec.track_with_status(restored, Up);
        rec.track(fresh);

        let full = rec.build_report(false);
        let status_of = |id| full.samples.iter().find(|s| s.resource_id == id).unwrap().status;
        assert_eq!(status_of(restored), Up);
        assert_eq!(status_of(fresh), Unknown);

        // What the full report said is the new baseline for both.
        assert!(!rec.record(restored, 1, Up).unwrap());
        assert!(!rec.record(fresh, 1, Unknown).unwrap());
        assert!(rec.record(restored, 2, Down).unwrap());
        assert_eq!(ids(&rec.build_report(true)), vec![restored]);
    }

    #[test]
    fn unknown_resource_is_rejected() {
        let rec = AvailabilityReconciler::new("agent");
        let err = rec.record(ResourceId::new(), 1, Up).unwrap_err();
        assert!(matches!(err, CoreError::UnknownResource { .. }));
    }

    #[test]
    fn untrack_drops_pending_mark() {
        let rec = AvailabilityReconciler::new("agent");
        let id = ResourceId::new();
        rec.track(id);
        rec.record(id, 1, Up).unwrap();
        rec.untrack(id);

        assert_eq!(rec.tracked_len(), 0);
        assert!(rec.build_report(true).is_empty());
        assert!(rec.build_report(false).is_empty());
    }

    #[test]
    fn last_known_statuses_skip_unsampled() {
        let rec = AvailabilityReconciler::new("agent");
        let (a, b) = (ResourceId::new(), ResourceId::new());
        rec.track(a);
        rec.track(b);
        rec.record(a, 1, Down).unwrap();

        let statuses = rec.last_known_statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[&a], Down);
        assert_eq!(rec.last_known(b), None);
    }

    #[test]
    fn concurrent_recordings_are_never_lost() {
        let rec = Arc::new(AvailabilityReconciler::new("agent"));
        let resources: Vec<ResourceId> = (0..32).map(|_| ResourceId::new()).collect();
        for id in &resources {
            rec.track(*id);
        }

        let mut seen = IndexSet::new();
        std::thread::scope(|scope| {
            for chunk in resources.chunks(8) {
                let rec = Arc::clone(&rec);
                scope.spawn(move || {
                    for (n, id) in chunk.iter().enumerate() {
                        rec.record(*id, i64::try_from(n).unwrap(), Up).unwrap();
                    }
                });
            }
            for _ in 0..4 {
                seen.extend(ids(&rec.build_report(true)));
            }
        });
        seen.extend(ids(&rec.build_report(true)));

        assert_eq!(seen.len(), resources.len());
    }
}
