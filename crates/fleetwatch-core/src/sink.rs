// ── Report sink ──
//
// Outbound side of the agent: availability reports and inventory status
// changes. Transport, retries and timeouts belong to the implementation.

use std::sync::{Mutex, PoisonError};

use crate::error::BoxError;
use crate::model::{AvailabilityReport, StatusChange};

pub trait ReportSink: Send + Sync {
    fn send_availability(&self, report: &AvailabilityReport) -> Result<(), BoxError>;

    fn inventory_status_changed(&self, change: &StatusChange) -> Result<(), BoxError>;
}

/// Sink that keeps everything it is sent. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    reports: Mutex<Vec<AvailabilityReport>>,
    changes: Mutex<Vec<StatusChange>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<AvailabilityReport> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn status_changes(&self) -> Vec<StatusChange> {
        self.changes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ReportSink for MemoryReportSink {
    fn send_availability(&self, report: &AvailabilityReport) -> Result<(), BoxError> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
        Ok(())
    }

    fn inventory_status_changed(&self, change: &StatusChange) -> Result<(), BoxError> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(change.clone());
        Ok(())
    }
}
