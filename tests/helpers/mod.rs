//! In-memory fakes of the pipeline's external collaborators.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use asset_ingest::db::job_store::{JobStore, JobStoreError, JobUpdate, NewJob};
use asset_ingest::db::resource_store::{ResourceStore, ResourceStoreError};
use asset_ingest::models::ingest::{IngestAssetItem, IngestRequest, IngestStatus};
use asset_ingest::models::job::{Job, JobItem, JobItemStatus, JobStatus};
use asset_ingest::models::resource::ResourceMetadata;
use asset_ingest::services::assets::{AssetClientError, AssetServiceClient};
use asset_ingest::services::generation::{
    ContentKind, GeneratedImage, GenerationClient, GenerationError,
};
use asset_ingest::services::media::{MediaError, MediaProcessor};
use asset_ingest::services::storage::{BlobStorage, StorageError};
use asset_ingest::services::worker::IngestWorker;

/// Job store backed by a map, with hooks for scripting failures and an
/// external cancel landing mid-job.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
    create_calls: AtomicUsize,
    fail_create: AtomicUsize,
    cancel_after_item: Mutex<Option<i32>>,
}

impl InMemoryJobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `create` call fail.
    pub fn fail_next_create(&self) {
        self.fail_create.store(1, Ordering::SeqCst);
    }

    /// Flip the job to Canceled as soon as this item reaches a terminal
    /// status, modeling an external cancel arriving between two items.
    pub fn cancel_after_item(&self, index: i32) {
        *self.cancel_after_item.lock().unwrap() = Some(index);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Seed a job directly, bypassing submission.
    pub fn insert(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }

    /// Current state of a job; panics if it does not exist.
    pub fn job(&self, job_id: Uuid) -> Job {
        self.jobs
            .lock()
            .unwrap()
            .get(&job_id)
            .cloned()
            .expect("job not found in store")
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: NewJob) -> Result<Uuid, JobStoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_create.swap(0, Ordering::SeqCst) > 0 {
            return Err(JobStoreError::Unavailable("scripted create failure".into()));
        }

        let job_id = Uuid::new_v4();
        let items = job
            .items
            .into_iter()
            .map(|item| JobItem {
                index: item.index,
                status: JobItemStatus::Pending,
                data: item.data,
                result: None,
                started_at: None,
                completed_at: None,
            })
            .collect();

        self.jobs.lock().unwrap().insert(
            job_id,
            Job {
                id: job_id,
                owner_id: job.owner_id,
                kind: job.kind,
                status: JobStatus::Pending,
                estimated_duration: job.estimated_duration,
                started_at: None,
                completed_at: None,
                items,
            },
        );

        Ok(job_id)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>, JobStoreError> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    async fn update(&self, job_id: Uuid, update: JobUpdate) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.get_mut(&job_id) else {
            return Ok(());
        };

        if let Some(status) = update.status {
            job.status = status;
        }
        if let Some(at) = update.started_at {
            job.started_at = Some(at);
        }
        if let Some(at) = update.completed_at {
            job.completed_at = Some(at);
        }

        let mut cancel_tripped = false;
        for item_update in &update.items {
            let Some(item) = job.items.iter_mut().find(|i| i.index == item_update.index) else {
                continue;
            };

            if let Some(status) = item_update.status {
                item.status = status;

                let mut hook = self.cancel_after_item.lock().unwrap();
                if status.is_terminal() && *hook == Some(item.index) {
                    hook.take();
                    cancel_tripped = true;
                }
            }
            if let Some(result) = &item_update.result {
                item.result = Some(result.clone());
            }
            if let Some(at) = item_update.started_at {
                item.started_at = Some(at);
            }
            if let Some(at) = item_update.completed_at {
                item.completed_at = Some(at);
            }
        }

        if cancel_tripped {
            job.status = JobStatus::Canceled;
        }

        Ok(())
    }
}

/// Generation client returning fixed bytes, with scripted per-call failures.
#[derive(Default)]
pub struct FakeGenerationClient {
    calls: AtomicUsize,
    fail_on: Mutex<Vec<usize>>,
    pub prompts: Mutex<Vec<String>>,
    pub kinds: Mutex<Vec<ContentKind>>,
}

impl FakeGenerationClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the given 1-based calls.
    pub fn fail_on_calls(&self, calls: &[usize]) {
        *self.fail_on.lock().unwrap() = calls.to_vec();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for FakeGenerationClient {
    async fn generate(
        &self,
        kind: ContentKind,
        prompt: &str,
    ) -> Result<GeneratedImage, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.kinds.lock().unwrap().push(kind);

        if self.fail_on.lock().unwrap().contains(&call) {
            return Err(GenerationError::Api {
                status: 500,
                body: "model overloaded".to_string(),
            });
        }

        let (width, height) = kind.dimensions();
        Ok(GeneratedImage {
            bytes: vec![0xAB; 64],
            width,
            height,
        })
    }
}

/// Asset client recording every call, with a scripted number of initial
/// status-push failures.
#[derive(Default)]
pub struct FakeAssetClient {
    fail_first: AtomicUsize,
    status_calls: Mutex<Vec<(Uuid, IngestStatus)>>,
    token_links: Mutex<Vec<(Uuid, Uuid)>>,
}

impl FakeAssetClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the first `n` status pushes, then succeed.
    pub fn failing_first(n: usize) -> Arc<Self> {
        let client = Self::default();
        client.fail_first.store(n, Ordering::SeqCst);
        Arc::new(client)
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing_first(usize::MAX)
    }

    pub fn status_pushes(&self) -> Vec<(Uuid, IngestStatus)> {
        self.status_calls.lock().unwrap().clone()
    }

    pub fn token_links(&self) -> Vec<(Uuid, Uuid)> {
        self.token_links.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetServiceClient for FakeAssetClient {
    async fn update_ingest_status(
        &self,
        asset_id: Uuid,
        status: IngestStatus,
    ) -> Result<(), AssetClientError> {
        self.status_calls.lock().unwrap().push((asset_id, status));

        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first
                .store(remaining.saturating_sub(1), Ordering::SeqCst);
            return Err(AssetClientError::Api {
                status: 503,
                body: "asset service unavailable".to_string(),
            });
        }

        Ok(())
    }

    async fn add_token(&self, asset_id: Uuid, resource_id: Uuid) -> Result<(), AssetClientError> {
        self.token_links
            .lock()
            .unwrap()
            .push((asset_id, resource_id));
        Ok(())
    }
}

/// Blob storage recording saves in memory.
#[derive(Default)]
pub struct FakeBlobStorage {
    primary: Mutex<Vec<(String, Vec<u8>, String)>>,
    thumbnails: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakeBlobStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn primary_paths(&self) -> Vec<String> {
        self.primary
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _, _)| path.clone())
            .collect()
    }

    pub fn thumbnail_paths(&self) -> Vec<String> {
        self.thumbnails
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[async_trait]
impl BlobStorage for FakeBlobStorage {
    async fn save_primary(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.primary.lock().unwrap().push((
            path.to_string(),
            data.to_vec(),
            content_type.to_string(),
        ));
        Ok(())
    }

    async fn save_thumbnail(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        self.thumbnails
            .lock()
            .unwrap()
            .push((path.to_string(), data.to_vec()));
        Ok(())
    }
}

/// Media processor returning fixed thumbnail bytes.
pub struct FakeMediaProcessor {
    thumb: Vec<u8>,
    calls: AtomicUsize,
}

impl FakeMediaProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            thumb: vec![0xCD; 16],
            calls: AtomicUsize::new(0),
        })
    }

    /// A processor that produces empty thumbnails.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            thumb: Vec::new(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProcessor for FakeMediaProcessor {
    async fn thumbnail(
        &self,
        _content_type: &str,
        _data: &[u8],
        _edge: u32,
    ) -> Result<Vec<u8>, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.thumb.clone())
    }
}

/// Resource store recording persisted metadata.
#[derive(Default)]
pub struct FakeResourceStore {
    records: Mutex<Vec<ResourceMetadata>>,
}

impl FakeResourceStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<ResourceMetadata> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceStore for FakeResourceStore {
    async fn add(&self, resource: ResourceMetadata) -> Result<(), ResourceStoreError> {
        self.records.lock().unwrap().push(resource);
        Ok(())
    }
}

/// The full set of fakes needed to assemble a worker.
pub struct TestPipeline {
    pub jobs: Arc<InMemoryJobStore>,
    pub generation: Arc<FakeGenerationClient>,
    pub assets: Arc<FakeAssetClient>,
    pub storage: Arc<FakeBlobStorage>,
    pub media: Arc<FakeMediaProcessor>,
    pub resources: Arc<FakeResourceStore>,
}

impl TestPipeline {
    pub fn new() -> Self {
        Self {
            jobs: InMemoryJobStore::new(),
            generation: FakeGenerationClient::new(),
            assets: FakeAssetClient::new(),
            storage: FakeBlobStorage::new(),
            media: FakeMediaProcessor::new(),
            resources: FakeResourceStore::new(),
        }
    }

    pub fn worker(&self) -> IngestWorker {
        IngestWorker::new(
            self.jobs.clone(),
            self.generation.clone(),
            self.assets.clone(),
            self.storage.clone(),
            self.media.clone(),
            self.resources.clone(),
        )
    }
}

/// A submission item requesting the given generation kinds.
pub fn asset_item(name: &str, portrait: bool, token: bool) -> IngestAssetItem {
    IngestAssetItem {
        asset_id: Uuid::new_v4(),
        name: name.to_string(),
        kind: "creature".to_string(),
        category: Some("fantasy".to_string()),
        asset_type: Some("dragon".to_string()),
        subtype: None,
        description: Some("breathes fire".to_string()),
        environment: Some("a mountain lair".to_string()),
        tags: vec!["boss".to_string()],
        template_id: None,
        generate_portrait: portrait,
        generate_token: token,
    }
}

pub fn request(owner_id: Uuid, items: Vec<IngestAssetItem>) -> IngestRequest {
    IngestRequest { owner_id, items }
}
