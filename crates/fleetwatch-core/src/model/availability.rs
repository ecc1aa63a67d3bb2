// ── Availability domain types ──
//
// A sample is a point observation: at `timestamp_millis` the resource was
// in `status`. Nothing about duration is implied; uptime has to be derived
// from an ordered sequence of samples.

use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::ResourceId;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityStatus {
    Up,
    Down,
    #[default]
    Unknown,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySample {
    pub resource_id: ResourceId,
    pub status: AvailabilityStatus,
    pub timestamp_millis: i64,
}

impl AvailabilitySample {
    pub fn new(resource_id: ResourceId, timestamp_millis: i64, status: AvailabilityStatus) -> Self {
        Self {
            resource_id,
            status,
            timestamp_millis,
        }
    }
}

/// Outbound batch of samples for the reporting sink.
///
/// A full report holds exactly one sample per tracked resource; a
/// changes-only report holds samples only for resources whose status
/// changed since the previous report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    pub origin_id: String,
    pub changes_only: bool,
    pub samples: Vec<AvailabilitySample>,
}

impl AvailabilityReport {
    pub fn new(origin_id: impl Into<String>, changes_only: bool) -> Self {
        Self {
            origin_id: origin_id.into(),
            changes_only,
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Summary line, optionally followed by one line per sample.
    pub fn describe(&self, include_all: bool) -> String {
        let mut out = self.to_string();
        if include_all {
            for sample in &self.samples {
                let _ = write!(
                    out,
                    "\nresource[{}], avail[{}@{}]",
                    sample.resource_id, sample.status, sample.timestamp_millis
                );
            }
        }
        out
    }
}

impl fmt::Display for AvailabilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AV:[{}][{}][{}]",
            self.origin_id,
            self.samples.len(),
            if self.changes_only { "changesOnly" } else { "full" }
        )
    }
}
