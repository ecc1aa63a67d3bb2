// ── Runtime settings ──
//
// What the core needs from configuration. Built by the caller (usually
// from `fleetwatch-config`); the core itself never reads files.

use serde::{Deserialize, Serialize};

const DEFAULT_ORIGIN: &str = "fleetwatch-agent";
const DEFAULT_PARALLEL_PROBES: usize = 8;
const DEFAULT_FULL_REPORT_INTERVAL: u32 = 10;

/// When a non-committed resource that discovery stopped reporting is
/// removed from the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalPolicy {
    /// Consecutive successful runs a resource may be missing from before
    /// it is removed. `1` removes on the first miss; `0` behaves like `1`.
    pub missed_cycles_before_removal: u32,
}

impl RemovalPolicy {
    pub fn should_remove(self, missed: u32) -> bool {
        missed >= self.missed_cycles_before_removal.max(1)
    }
}

impl Default for RemovalPolicy {
    fn default() -> Self {
        Self {
            missed_cycles_before_removal: 1,
        }
    }
}

/// Settings handed to [`InventoryAgent`](crate::InventoryAgent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    /// Stamped on every availability report.
    pub origin_id: String,
    pub removal: RemovalPolicy,
    pub max_parallel_probes: usize,
    /// Every Nth availability report is sent full. `0` disables periodic
    /// full reports.
    pub full_report_interval: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            origin_id: DEFAULT_ORIGIN.into(),
            removal: RemovalPolicy::default(),
            max_parallel_probes: DEFAULT_PARALLEL_PROBES,
            full_report_interval: DEFAULT_FULL_REPORT_INTERVAL,
        }
    }
}
