//! Run domain types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Terminal status of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// Outcome record of one end-to-end run
///
/// Created at process start, reported and discarded at process end.
/// Nothing about a run is persisted across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub status: RunStatus,
    pub message: String,
    /// Diagnostic snapshots captured during the run, attached to the report
    pub snapshots: Vec<PathBuf>,
}

impl RunReport {
    pub fn succeeded(
        started_at: chrono::DateTime<chrono::Utc>,
        message: impl Into<String>,
        snapshots: Vec<PathBuf>,
    ) -> Self {
        Self {
            started_at,
            finished_at: chrono::Utc::now(),
            status: RunStatus::Succeeded,
            message: message.into(),
            snapshots,
        }
    }

    pub fn failed(
        started_at: chrono::DateTime<chrono::Utc>,
        message: impl Into<String>,
        snapshots: Vec<PathBuf>,
    ) -> Self {
        Self {
            started_at,
            finished_at: chrono::Utc::now(),
            status: RunStatus::Failed,
            message: message.into(),
            snapshots,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}
