use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::job::{Job, JobItemStatus, JobStatus};

/// What to generate for an asset. Determines prompt framing, storage layout,
/// and post-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GenerationType {
    Portrait,
    Token,
}

/// Asset-level rollup of the asset's generation tasks. Owned by the asset
/// service; this pipeline only computes and pushes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IngestStatus {
    Processing,
    PendingReview,
    Failed,
    PartialFailure,
}

/// Payload serialized into a job item. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestItemData {
    pub asset_id: Uuid,
    pub name: String,
    pub kind: String,
    pub category: Option<String>,
    pub asset_type: Option<String>,
    pub subtype: Option<String>,
    pub description: Option<String>,
    pub environment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub generation_type: GenerationType,
    pub template_id: Option<Uuid>,
}

/// Outcome serialized into a job item on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestItemResult {
    pub asset_id: Uuid,
    pub generation_type: GenerationType,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<Uuid>,
}

/// One asset in an ingest submission.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IngestAssetItem {
    #[garde(skip)]
    pub asset_id: Uuid,

    #[garde(length(min = 1, max = 128))]
    pub name: String,

    #[garde(length(min = 1, max = 64))]
    pub kind: String,

    #[garde(skip)]
    pub category: Option<String>,

    #[garde(skip)]
    pub asset_type: Option<String>,

    #[garde(skip)]
    pub subtype: Option<String>,

    #[garde(skip)]
    pub description: Option<String>,

    #[garde(skip)]
    pub environment: Option<String>,

    #[garde(skip)]
    #[serde(default)]
    pub tags: Vec<String>,

    #[garde(skip)]
    pub template_id: Option<Uuid>,

    #[garde(skip)]
    #[serde(default)]
    pub generate_portrait: bool,

    #[garde(skip)]
    #[serde(default)]
    pub generate_token: bool,
}

/// Request to submit a batch of assets for media generation.
#[derive(Debug, Deserialize, Validate)]
pub struct IngestRequest {
    #[garde(skip)]
    pub owner_id: Uuid,

    #[garde(length(min = 1), dive)]
    pub items: Vec<IngestAssetItem>,
}

/// Response after a submission was accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestAccepted {
    pub job_id: Uuid,
    pub item_count: usize,
    pub asset_ids: Vec<Uuid>,
}

/// Response for polling a job.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub id: Uuid,
    pub kind: String,
    pub status: JobStatus,
    pub estimated_seconds: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items: Vec<JobItemStatusResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobItemStatusResponse {
    pub index: i32,
    pub status: JobItemStatus,
    pub result: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            kind: job.kind.clone(),
            status: job.status,
            estimated_seconds: job.estimated_duration.as_secs(),
            started_at: job.started_at,
            completed_at: job.completed_at,
            items: job
                .items
                .iter()
                .map(|item| JobItemStatusResponse {
                    index: item.index,
                    status: item.status,
                    result: item.result.clone(),
                    started_at: item.started_at,
                    completed_at: item.completed_at,
                })
                .collect(),
        }
    }
}
