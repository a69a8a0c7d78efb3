//! Background consumer that drives ingest jobs to completion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::job_store::{JobItemUpdate, JobStore, JobStoreError, JobUpdate};
use crate::db::resource_store::{ResourceStore, ResourceStoreError};
use crate::models::ingest::{GenerationType, IngestItemData, IngestItemResult, IngestStatus};
use crate::models::job::{Job, JobItem, JobItemStatus, JobStatus, WorkToken};
use crate::models::resource::{ResourceMetadata, ResourceRole};
use crate::services::assets::{AssetClientError, AssetServiceClient};
use crate::services::generation::{ContentKind, GeneratedImage, GenerationClient, GenerationError};
use crate::services::ingest::INGEST_JOB_KIND;
use crate::services::media::{MediaError, MediaProcessor};
use crate::services::queue::WorkReceiver;
use crate::services::storage::{BlobStorage, StorageError};

const IMAGE_CONTENT_TYPE: &str = "image/png";
const THUMBNAIL_EDGE: u32 = 256;
const STATUS_PUSH_ATTEMPTS: u32 = 3;

/// The single consumer of the work queue.
///
/// Jobs are processed one at a time in token order; items within a job run
/// sequentially in index order. Job and item records are exclusively owned
/// by this worker after submission, so no locking is needed anywhere here.
pub struct IngestWorker {
    jobs: Arc<dyn JobStore>,
    generation: Arc<dyn GenerationClient>,
    assets: Arc<dyn AssetServiceClient>,
    storage: Arc<dyn BlobStorage>,
    media: Arc<dyn MediaProcessor>,
    resources: Arc<dyn ResourceStore>,
}

impl IngestWorker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        generation: Arc<dyn GenerationClient>,
        assets: Arc<dyn AssetServiceClient>,
        storage: Arc<dyn BlobStorage>,
        media: Arc<dyn MediaProcessor>,
        resources: Arc<dyn ResourceStore>,
    ) -> Self {
        Self {
            jobs,
            generation,
            assets,
            storage,
            media,
            resources,
        }
    }

    /// Main processing loop. Runs until shutdown is requested or every
    /// producer handle is gone. A shutdown mid-job abandons the current
    /// item without compensation.
    pub async fn run(self, mut rx: WorkReceiver, shutdown: CancellationToken) {
        info!("Ingest worker started");

        loop {
            let token = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Ingest worker stopping");
                    break;
                }
                token = rx.recv() => match token {
                    Some(token) => token,
                    None => break,
                },
            };

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(job_id = %token.job_id, "Ingest worker stopping mid-job");
                    break;
                }
                result = self.process_job(&token) => {
                    if let Err(e) = result {
                        error!(job_id = %token.job_id, error = %e, "Error processing ingest job");
                    }
                }
            }
        }

        info!("Ingest worker stopped");
    }

    /// Drive one job from Pending to Completed.
    async fn process_job(&self, token: &WorkToken) -> Result<(), JobStoreError> {
        let Some(job) = self.jobs.get(token.job_id).await? else {
            info!(job_id = %token.job_id, "Job not found, skipping");
            return Ok(());
        };

        if job.kind != INGEST_JOB_KIND || job.status == JobStatus::Canceled {
            info!(
                job_id = %job.id,
                kind = %job.kind,
                status = %job.status,
                "Job is not available for processing"
            );
            return Ok(());
        }

        let started = Instant::now();
        self.jobs
            .update(
                job.id,
                JobUpdate {
                    status: Some(JobStatus::InProgress),
                    started_at: Some(Utc::now()),
                    ..JobUpdate::default()
                },
            )
            .await?;

        let pending: Vec<&JobItem> = job
            .items
            .iter()
            .filter(|item| item.status == JobItemStatus::Pending)
            .collect();

        for item in pending {
            // External cancellation is only observed between items.
            if let Some(current) = self.jobs.get(job.id).await? {
                if current.status == JobStatus::Canceled {
                    info!(job_id = %job.id, "Job was canceled during processing");
                    break;
                }
            }

            if let Some(asset_id) = self.process_item(&job, item, token.owner_id).await {
                // Second aggregation opportunity beyond the end-of-job sweep,
                // so the rollup converges even if that sweep never runs.
                match self.jobs.get(job.id).await {
                    Ok(Some(current)) => self.push_asset_status(&current, asset_id).await,
                    Ok(None) => {}
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "Failed to re-fetch job for aggregation")
                    }
                }
            }
        }

        match self.jobs.get(job.id).await {
            Ok(Some(final_job)) => {
                for asset_id in distinct_asset_ids(&final_job) {
                    self.push_asset_status(&final_job, asset_id).await;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Failed to re-fetch job for final aggregation")
            }
        }

        // Completed regardless of item outcomes; partial and total failure
        // live at the item and asset level only.
        self.jobs
            .update(
                job.id,
                JobUpdate {
                    status: Some(JobStatus::Completed),
                    completed_at: Some(Utc::now()),
                    ..JobUpdate::default()
                },
            )
            .await?;

        let elapsed = started.elapsed();
        metrics::counter!("ingest_jobs_processed_total").increment(1);
        metrics::histogram!("ingest_job_duration_seconds").record(elapsed.as_secs_f64());
        info!(
            job_id = %job.id,
            duration_ms = elapsed.as_millis() as u64,
            "Ingest job completed"
        );

        Ok(())
    }

    /// Advance one item to a terminal state. Returns the item's asset id
    /// when the payload could be read, regardless of the outcome.
    async fn process_item(&self, job: &Job, item: &JobItem, owner_id: Uuid) -> Option<Uuid> {
        let data: IngestItemData = match serde_json::from_str(&item.data) {
            Ok(data) => data,
            Err(e) => {
                error!(
                    job_id = %job.id,
                    index = item.index,
                    error = %e,
                    "Failed to deserialize job item data"
                );
                self.mark_item_failed(job.id, item.index, "Invalid item data")
                    .await;
                return None;
            }
        };

        let asset_id = data.asset_id;
        if let Err(e) = self
            .process_item_inner(job.id, item, &data, owner_id)
            .await
        {
            warn!(
                job_id = %job.id,
                index = item.index,
                asset_id = %asset_id,
                error = %e,
                "Item processing failed"
            );
            self.mark_item_failed(job.id, item.index, &e.to_string())
                .await;
        }

        Some(asset_id)
    }

    async fn process_item_inner(
        &self,
        job_id: Uuid,
        item: &JobItem,
        data: &IngestItemData,
        owner_id: Uuid,
    ) -> Result<(), ItemError> {
        // Best-effort only; a failed push here must not fail the item.
        if let Err(e) = self
            .assets
            .update_ingest_status(data.asset_id, IngestStatus::Processing)
            .await
        {
            warn!(asset_id = %data.asset_id, error = %e, "Failed to push Processing status");
        }

        self.jobs
            .update(
                job_id,
                JobUpdate {
                    items: vec![JobItemUpdate {
                        index: item.index,
                        status: Some(JobItemStatus::InProgress),
                        started_at: Some(Utc::now()),
                        ..JobItemUpdate::default()
                    }],
                    ..JobUpdate::default()
                },
            )
            .await?;

        let prompt = build_prompt(data);
        let kind = ContentKind::from(data.generation_type);

        debug!(
            asset_id = %data.asset_id,
            generation_type = %data.generation_type,
            "Requesting generation"
        );
        let image = self.generation.generate(kind, &prompt).await?;

        let asset_path = asset_path(data.asset_id);
        let resource_id = match data.generation_type {
            GenerationType::Portrait => {
                self.store_portrait(&asset_path, data, &image).await?;
                None
            }
            GenerationType::Token => {
                Some(self.store_token(&asset_path, data, &image, owner_id).await?)
            }
        };

        let result = IngestItemResult {
            asset_id: data.asset_id,
            generation_type: data.generation_type,
            success: true,
            resource_id,
        };

        self.jobs
            .update(
                job_id,
                JobUpdate {
                    items: vec![JobItemUpdate {
                        index: item.index,
                        status: Some(JobItemStatus::Success),
                        result: Some(serde_json::to_string(&result)?),
                        completed_at: Some(Utc::now()),
                        ..JobItemUpdate::default()
                    }],
                    ..JobUpdate::default()
                },
            )
            .await?;

        Ok(())
    }

    async fn store_portrait(
        &self,
        asset_path: &str,
        data: &IngestItemData,
        image: &GeneratedImage,
    ) -> Result<(), ItemError> {
        self.storage
            .save_primary(asset_path, &image.bytes, IMAGE_CONTENT_TYPE)
            .await?;

        let thumbnail = self
            .media
            .thumbnail(IMAGE_CONTENT_TYPE, &image.bytes, THUMBNAIL_EDGE)
            .await?;
        if !thumbnail.is_empty() {
            self.storage.save_thumbnail(asset_path, &thumbnail).await?;
            debug!(asset_id = %data.asset_id, "Generated thumbnail");
        }

        info!(asset_id = %data.asset_id, "Saved portrait");
        Ok(())
    }

    async fn store_token(
        &self,
        asset_path: &str,
        data: &IngestItemData,
        image: &GeneratedImage,
        owner_id: Uuid,
    ) -> Result<Uuid, ItemError> {
        let token_index = next_token_index(data.asset_id);
        let token_path = format!("{asset_path}/{token_index}");

        self.storage
            .save_primary(&token_path, &image.bytes, IMAGE_CONTENT_TYPE)
            .await?;

        let metadata = ResourceMetadata {
            id: Uuid::now_v7(),
            owner_id,
            role: ResourceRole::Token,
            path: token_path,
            content_type: IMAGE_CONTENT_TYPE.to_string(),
            file_name: format!("{}_token.png", data.name),
            file_size: image.bytes.len() as u64,
            width: image.width,
            height: image.height,
            name: format!("{} Token", data.name),
            description: format!("Generated token for {}", data.name),
        };
        let resource_id = metadata.id;

        self.resources.add(metadata).await?;
        self.assets.add_token(data.asset_id, resource_id).await?;

        info!(asset_id = %data.asset_id, resource_id = %resource_id, "Saved token");
        Ok(resource_id)
    }

    /// Set an item Failed with an error message. Store errors here are
    /// logged and swallowed so one item's bookkeeping cannot abort its
    /// siblings.
    async fn mark_item_failed(&self, job_id: Uuid, index: i32, message: &str) {
        metrics::counter!("ingest_items_failed_total").increment(1);

        let update = JobUpdate {
            items: vec![JobItemUpdate {
                index,
                status: Some(JobItemStatus::Failed),
                result: Some(message.to_string()),
                completed_at: Some(Utc::now()),
                ..JobItemUpdate::default()
            }],
            ..JobUpdate::default()
        };

        if let Err(e) = self.jobs.update(job_id, update).await {
            error!(job_id = %job_id, index, error = %e, "Failed to record item failure");
        }
    }

    async fn push_asset_status(&self, job: &Job, asset_id: Uuid) {
        let asset_items = items_for_asset(job, asset_id);
        if asset_items.is_empty() {
            return;
        }

        if let Some(status) = aggregate_status(&asset_items) {
            push_status_with_retry(self.assets.as_ref(), asset_id, status).await;
        }
    }
}

/// Push an asset's ingest status with bounded retry: up to 3 attempts with
/// linear backoff between them. A final failure is logged and swallowed so
/// a flaky asset service cannot abort job processing.
pub async fn push_status_with_retry(
    assets: &dyn AssetServiceClient,
    asset_id: Uuid,
    status: IngestStatus,
) {
    for attempt in 1..=STATUS_PUSH_ATTEMPTS {
        match assets.update_ingest_status(asset_id, status).await {
            Ok(()) => {
                debug!(asset_id = %asset_id, status = %status, "Pushed ingest status");
                return;
            }
            Err(e) if attempt < STATUS_PUSH_ATTEMPTS => {
                warn!(
                    asset_id = %asset_id,
                    attempt,
                    error = %e,
                    "Failed to push ingest status, retrying"
                );
                sleep(Duration::from_secs(attempt as u64)).await;
            }
            Err(e) => {
                error!(
                    asset_id = %asset_id,
                    error = %e,
                    "Failed to push ingest status after {STATUS_PUSH_ATTEMPTS} attempts"
                );
            }
        }
    }
}

/// Compute an asset's rollup status from its items.
///
/// Returns `None` while any item is still Pending or InProgress; the rollup
/// only moves once every item is terminal.
pub fn aggregate_status(items: &[&JobItem]) -> Option<IngestStatus> {
    if items.is_empty() || items.iter().any(|item| !item.status.is_terminal()) {
        return None;
    }

    let success = items
        .iter()
        .filter(|item| item.status == JobItemStatus::Success)
        .count();
    let failed = items
        .iter()
        .filter(|item| item.status == JobItemStatus::Failed)
        .count();

    if success == items.len() {
        Some(IngestStatus::PendingReview)
    } else if failed == items.len() {
        Some(IngestStatus::Failed)
    } else if success > 0 && failed > 0 {
        Some(IngestStatus::PartialFailure)
    } else {
        None
    }
}

/// Primary storage path for an asset, `{last-4-of-id}/{full-id}`. The short
/// prefix keeps directory fan-out shallow.
pub fn asset_path(asset_id: Uuid) -> String {
    let id = asset_id.to_string();
    let suffix = &id[id.len() - 4..];
    format!("{suffix}/{id}")
}

/// Token slot for an asset. Ingest creates at most one token per asset, so
/// the first slot is always free.
///
/// TODO: derive the next free slot from stored resources once regeneration
/// can add a second token to the same asset.
fn next_token_index(_asset_id: Uuid) -> u32 {
    0
}

/// Natural-language prompt assembled from the asset's classification and
/// free-text fields.
fn build_prompt(data: &IngestItemData) -> String {
    let category = data.category.as_deref().unwrap_or("fantasy");
    let asset_type = data.asset_type.as_deref().unwrap_or("character");
    let mut prompt = format!("A {category} {asset_type} named {}", data.name);

    if let Some(description) = non_blank(&data.description) {
        prompt.push_str(&format!(". {description}"));
    }
    if let Some(environment) = non_blank(&data.environment) {
        prompt.push_str(&format!(" in {environment}"));
    }

    prompt
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn items_for_asset(job: &Job, asset_id: Uuid) -> Vec<&JobItem> {
    job.items
        .iter()
        .filter(|item| item_asset_id(item) == Some(asset_id))
        .collect()
}

fn distinct_asset_ids(job: &Job) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for item in &job.items {
        if let Some(id) = item_asset_id(item) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Asset id from an item's payload; items with unreadable payloads belong
/// to no asset.
fn item_asset_id(item: &JobItem) -> Option<Uuid> {
    serde_json::from_str::<IngestItemData>(&item.data)
        .ok()
        .map(|data| data.asset_id)
}

#[derive(Debug, thiserror::Error)]
enum ItemError {
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Assets(#[from] AssetClientError),

    #[error(transparent)]
    Resources(#[from] ResourceStoreError),

    #[error(transparent)]
    JobStore(#[from] JobStoreError),

    #[error("Failed to serialize item result: {0}")]
    Serialize(#[from] serde_json::Error),
}
