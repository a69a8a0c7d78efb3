use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::db::job_store::{JobStore, JobStoreError, NewJob, NewJobItem};
use crate::models::ingest::{
    GenerationType, IngestAccepted, IngestAssetItem, IngestItemData, IngestRequest,
};
use crate::models::job::WorkToken;
use crate::services::queue::{IngestQueue, QueueError};

/// Type tag carried by every job this pipeline creates.
pub const INGEST_JOB_KIND: &str = "asset_ingest";

/// Per-item duration estimate surfaced to callers. Display only, no effect
/// on execution.
const ESTIMATE_PER_ITEM: Duration = Duration::from_secs(30);

/// Accepts batch submissions, expands them into jobs, and hands them to the
/// worker.
pub struct IngestService {
    jobs: Arc<dyn JobStore>,
    queue: IngestQueue,
}

impl IngestService {
    pub fn new(jobs: Arc<dyn JobStore>, queue: IngestQueue) -> Self {
        Self { jobs, queue }
    }

    /// Expand a batch request into per-generation job items, create the job,
    /// and publish a work token for it.
    ///
    /// The job record is created before the token is published. A crash
    /// between the two steps leaves a Pending job no worker will ever pick
    /// up; there is no recovery scan for such orphans.
    pub async fn start_ingest(
        &self,
        request: IngestRequest,
    ) -> Result<IngestAccepted, IngestError> {
        if request.items.is_empty() {
            return Err(IngestError::EmptySubmission);
        }

        let items = expand_items(&request.items)?;
        let asset_ids: Vec<Uuid> = request.items.iter().map(|item| item.asset_id).collect();
        let item_count = items.len();

        let job_id = self
            .jobs
            .create(NewJob {
                owner_id: request.owner_id,
                kind: INGEST_JOB_KIND.to_string(),
                estimated_duration: ESTIMATE_PER_ITEM * item_count as u32,
                items,
            })
            .await
            .map_err(IngestError::JobCreation)?;

        self.queue.enqueue(WorkToken {
            job_id,
            owner_id: request.owner_id,
        })?;

        info!(
            job_id = %job_id,
            item_count,
            asset_count = asset_ids.len(),
            "Accepted ingest job"
        );

        Ok(IngestAccepted {
            job_id,
            item_count,
            asset_ids,
        })
    }
}

/// Expand submitted assets into job items, one per requested generation
/// kind, Portrait before Token, indexed by a running counter.
fn expand_items(items: &[IngestAssetItem]) -> Result<Vec<NewJobItem>, IngestError> {
    let mut expanded = Vec::new();

    for item in items {
        for generation_type in requested_kinds(item) {
            let data = IngestItemData {
                asset_id: item.asset_id,
                name: item.name.clone(),
                kind: item.kind.clone(),
                category: item.category.clone(),
                asset_type: item.asset_type.clone(),
                subtype: item.subtype.clone(),
                description: item.description.clone(),
                environment: item.environment.clone(),
                tags: item.tags.clone(),
                generation_type,
                template_id: item.template_id,
            };

            expanded.push(NewJobItem {
                index: expanded.len() as i32,
                data: serde_json::to_string(&data)?,
            });
        }
    }

    Ok(expanded)
}

fn requested_kinds(item: &IngestAssetItem) -> Vec<GenerationType> {
    let mut kinds = Vec::with_capacity(2);
    if item.generate_portrait {
        kinds.push(GenerationType::Portrait);
    }
    if item.generate_token {
        kinds.push(GenerationType::Token);
    }
    kinds
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("At least one item is required")]
    EmptySubmission,

    #[error("Failed to create ingest job: {0}")]
    JobCreation(#[source] JobStoreError),

    #[error("Failed to serialize item data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
