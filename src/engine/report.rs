//! Run reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::{ResourceKey, TaskOutcome};

/// Final status of one resource in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Reconciled successfully.
    Done {
        /// What was done.
        outcome: TaskOutcome,
    },
    /// Reconciliation failed.
    Failed {
        /// Error text, including any provider message.
        message: String,
    },
    /// Not attempted because a dependency failed.
    Skipped {
        /// The failed dependency.
        dependency: String,
    },
}

/// Result for a single resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceResult {
    /// The resource.
    pub key: ResourceKey,
    /// Its final status.
    #[serde(flatten)]
    pub status: ResourceStatus,
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique run id.
    pub run_id: Uuid,
    /// Render target used.
    pub target: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-resource results, in execution order.
    pub results: Vec<ResourceResult>,
}

impl RunReport {
    /// Number of resources that reconciled successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, ResourceStatus::Done { .. }))
            .count()
    }

    /// Number of resources that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, ResourceStatus::Failed { .. }))
            .count()
    }

    /// Number of resources skipped because a dependency failed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, ResourceStatus::Skipped { .. }))
            .count()
    }

    /// Returns true if every resource reconciled.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }

    /// Returns the status recorded for a resource.
    #[must_use]
    pub fn status(&self, key: &ResourceKey) -> Option<&ResourceStatus> {
        self.results.iter().find(|r| &r.key == key).map(|r| &r.status)
    }

    /// Duration of the run in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
