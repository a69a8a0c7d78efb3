use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Overall status of an ingest job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Canceled,
}

impl JobStatus {
    /// Completed and Canceled jobs never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Canceled)
    }
}

/// Status of a single generation task within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobItemStatus {
    Pending,
    InProgress,
    Success,
    Failed,
}

impl JobItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobItemStatus::Success | JobItemStatus::Failed)
    }
}

/// A submitted ingest job and its generation tasks.
///
/// Created once by submission, then owned exclusively by the worker; the only
/// outside write after enqueue is a status flip to Canceled.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: String,
    pub status: JobStatus,
    /// Caller-facing estimate only; has no effect on execution.
    pub estimated_duration: Duration,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Ordered by index; the index is the item's only identifier.
    pub items: Vec<JobItem>,
}

/// One generation task (one asset, one generation kind).
#[derive(Debug, Clone)]
pub struct JobItem {
    pub index: i32,
    pub status: JobItemStatus,
    /// Serialized `IngestItemData`, opaque to the job store.
    pub data: String,
    /// Serialized `IngestItemResult` on success, an error message on failure.
    pub result: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Queue message telling the worker a job is ready. A pointer to job state,
/// not a copy of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkToken {
    pub job_id: Uuid,
    pub owner_id: Uuid,
}
