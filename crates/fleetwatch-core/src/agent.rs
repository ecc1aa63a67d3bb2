// ── Inventory agent ──
//
// Facade over the core for a caller that drives the cadence: it loads and
// saves the inventory, applies discovery, records availability and sends
// reports. Every tree mutation keeps the reconciler's tracked set in step.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::availability::AvailabilityReconciler;
use crate::config::AgentSettings;
use crate::discovery::{DiscoveryJob, DiscoveryRunner};
use crate::error::CoreError;
use crate::model::{AvailabilityReport, AvailabilitySample, Resource, ResourceId, StatusChange};
use crate::persistence::{self, InventoryStore, RestoreFailure};
use crate::sink::ReportSink;
use crate::store::{DiscoveryBatch, MergeOutcome, ResourceTree};
use crate::type_graph::TypeGraph;

// ── InventoryAgent ──────────────────────────────────────────────────

pub struct InventoryAgent {
    settings: AgentSettings,
    graph: Arc<TypeGraph>,
    tree: Arc<ResourceTree>,
    availability: AvailabilityReconciler,
    runner: DiscoveryRunner,
    sink: Arc<dyn ReportSink>,
    store: Arc<dyn InventoryStore>,
    reports_sent: AtomicU64,
    /// Set when a report could not be delivered; its changes are gone, so
    /// the next report must be full.
    resend_full: AtomicBool,
}

impl InventoryAgent {
    pub fn new(
        settings: AgentSettings,
        graph: Arc<TypeGraph>,
        sink: Arc<dyn ReportSink>,
        store: Arc<dyn InventoryStore>,
    ) -> Self {
        let tree = Arc::new(ResourceTree::new());
        let runner = DiscoveryRunner::new(Arc::clone(&graph), Arc::clone(&tree), &settings);
        Self {
            availability: AvailabilityReconciler::new(&settings.origin_id),
            settings,
            graph,
            tree,
            runner,
            sink,
            store,
            reports_sent: AtomicU64::new(0),
            resend_full: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn graph(&self) -> &Arc<TypeGraph> {
        &self.graph
    }

    pub fn tree(&self) -> &Arc<ResourceTree> {
        &self.tree
    }

    pub fn availability(&self) -> &AvailabilityReconciler {
        &self.availability
    }

    // ── Inventory lifecycle ──────────────────────────────────────────

    /// Start a fresh inventory rooted at the platform resource.
    pub fn set_platform(&self, platform: Resource) -> ResourceId {
        let root = self.tree.set_root(platform);
        self.availability.retain(|id| id == root);
        self.availability.track(root);
        root
    }

    /// Replace the inventory with the stored snapshot, if there is one.
    ///
    /// Returns the subtrees that could not be restored.
    pub fn load(&self) -> Result<Vec<RestoreFailure>, CoreError> {
        let Some(bytes) = self.store.load()? else {
            info!("no stored inventory, starting empty");
            return Ok(Vec::new());
        };
        let restored = persistence::restore(&bytes, &self.graph)?;
        for failure in &restored.failures {
            warn!(
                resource_id = %failure.resource_id,
                resource_type = %failure.resource_type,
                skipped = failure.skipped,
                "inventory subtree not restored"
            );
        }

        self.tree.replace_with(restored.tree);
        let ids: HashSet<ResourceId> = self.tree.ids().into_iter().collect();
        self.availability.retain(|id| ids.contains(&id));
        for id in &ids {
            match restored.availability.get(id) {
                Some(status) => self.availability.track_with_status(*id, *status),
                None => self.availability.track(*id),
            }
        }
        Ok(restored.failures)
    }

    /// Persist the inventory and availability baselines. Returns the
    /// snapshot size in bytes.
    pub fn save(&self) -> Result<usize, CoreError> {
        let bytes = persistence::snapshot(&self.tree, &self.availability.last_known_statuses())?;
        self.store.save(&bytes)?;
        Ok(bytes.len())
    }

    // ── Discovery ────────────────────────────────────────────────────

    pub fn apply_discovery(&self, batch: DiscoveryBatch) -> MergeOutcome {
        let outcome = self
            .tree
            .apply_discovery(&self.graph, batch, self.settings.removal);
        self.sync_tracking(&outcome);
        outcome
    }

    pub async fn run_discovery(&self, jobs: Vec<DiscoveryJob>) -> MergeOutcome {
        let outcome = self.runner.run(jobs).await;
        self.sync_tracking(&outcome);
        outcome
    }

    /// Attach an operator-supplied resource.
    pub fn add_manual(&self, resource: Resource, parent: ResourceId) -> Result<ResourceId, CoreError> {
        let id = self.tree.add_manual(resource, parent)?;
        self.availability.track(id);
        Ok(id)
    }

    /// Remove a resource and its subtree through explicit administrative
    /// action.
    pub fn remove(&self, id: ResourceId) -> Result<Vec<ResourceId>, CoreError> {
        let removed = self.tree.detach(id)?;
        for gone in &removed {
            self.availability.untrack(*gone);
        }
        Ok(removed)
    }

    fn sync_tracking(&self, outcome: &MergeOutcome) {
        for id in &outcome.added {
            self.availability.track(*id);
        }
        for id in &outcome.removed {
            self.availability.untrack(*id);
        }
    }

    // ── Availability ─────────────────────────────────────────────────

    pub fn record_availability(&self, sample: AvailabilitySample) -> Result<bool, CoreError> {
        self.availability.record_sample(sample)
    }

    /// Build the next report and hand it to the sink.
    ///
    /// The first report, every `full_report_interval`-th one after it, the
    /// one following a failed delivery, and any with `force_full` are
    /// full; the rest carry changes only.
    pub fn send_availability_report(&self, force_full: bool) -> Result<AvailabilityReport, CoreError> {
        let sequence = self.reports_sent.fetch_add(1, Ordering::SeqCst);
        let interval = u64::from(self.settings.full_report_interval);
        let periodic = sequence == 0 || (interval > 0 && sequence % interval == 0);
        let full = force_full || periodic || self.resend_full.swap(false, Ordering::SeqCst);

        let report = self.availability.build_report(!full);
        if let Err(err) = self.sink.send_availability(&report) {
            self.resend_full.store(true, Ordering::SeqCst);
            warn!(report = %report, error = %err, "availability report not delivered");
            return Err(CoreError::Sink {
                message: err.to_string(),
            });
        }
        debug!(report = %report.describe(false), "availability report sent");
        Ok(report)
    }

    // ── Administrative transitions ───────────────────────────────────

    pub fn commit(&self, id: ResourceId, server_id: u32) -> Result<StatusChange, CoreError> {
        self.forward(self.tree.commit(id, server_id)?)
    }

    pub fn ignore(&self, id: ResourceId) -> Result<StatusChange, CoreError> {
        self.forward(self.tree.ignore(id)?)
    }

    pub fn unignore(&self, id: ResourceId) -> Result<StatusChange, CoreError> {
        self.forward(self.tree.unignore(id)?)
    }

    fn forward(&self, change: StatusChange) -> Result<StatusChange, CoreError> {
        self.sink
            .inventory_status_changed(&change)
            .map_err(|err| CoreError::Sink {
                message: err.to_string(),
            })?;
        Ok(change)
    }
}
