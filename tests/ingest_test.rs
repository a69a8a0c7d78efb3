//! Submission tests: request expansion, job creation, and work token
//! publication, all against in-memory collaborators.

mod helpers;

use std::time::Duration;

use helpers::*;
use uuid::Uuid;

use asset_ingest::models::ingest::{GenerationType, IngestItemData};
use asset_ingest::services::ingest::{IngestError, IngestService, INGEST_JOB_KIND};
use asset_ingest::services::queue::IngestQueue;

#[tokio::test]
async fn empty_submission_is_rejected_without_creating_a_job() {
    let jobs = InMemoryJobStore::new();
    let (queue, mut rx) = IngestQueue::new();
    let service = IngestService::new(jobs.clone(), queue.clone());

    let result = service
        .start_ingest(request(Uuid::new_v4(), Vec::new()))
        .await;

    assert!(matches!(result, Err(IngestError::EmptySubmission)));
    assert_eq!(jobs.create_calls(), 0);

    drop(queue);
    drop(service);
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn one_asset_requesting_both_kinds_yields_two_items_portrait_first() {
    let jobs = InMemoryJobStore::new();
    let (queue, _rx) = IngestQueue::new();
    let service = IngestService::new(jobs.clone(), queue.clone());

    let owner_id = Uuid::new_v4();
    let item = asset_item("Smaug", true, true);
    let asset_id = item.asset_id;

    let accepted = service
        .start_ingest(request(owner_id, vec![item]))
        .await
        .unwrap();

    assert_eq!(accepted.item_count, 2);
    assert_eq!(accepted.asset_ids, vec![asset_id]);

    let job = jobs.job(accepted.job_id);
    assert_eq!(job.kind, INGEST_JOB_KIND);
    assert_eq!(job.owner_id, owner_id);
    assert_eq!(job.items.len(), 2);
    assert_eq!(job.items[0].index, 0);
    assert_eq!(job.items[1].index, 1);

    let first: IngestItemData = serde_json::from_str(&job.items[0].data).unwrap();
    let second: IngestItemData = serde_json::from_str(&job.items[1].data).unwrap();
    assert_eq!(first.generation_type, GenerationType::Portrait);
    assert_eq!(second.generation_type, GenerationType::Token);
    assert_eq!(first.asset_id, asset_id);
    assert_eq!(second.asset_id, asset_id);
}

#[tokio::test]
async fn accepted_submission_publishes_one_work_token() {
    let jobs = InMemoryJobStore::new();
    let (queue, mut rx) = IngestQueue::new();
    let service = IngestService::new(jobs.clone(), queue.clone());

    let owner_id = Uuid::new_v4();
    let accepted = service
        .start_ingest(request(owner_id, vec![asset_item("Mira", true, false)]))
        .await
        .unwrap();

    drop(queue);
    drop(service);

    let token = rx.recv().await.expect("expected a work token");
    assert_eq!(token.job_id, accepted.job_id);
    assert_eq!(token.owner_id, owner_id);
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn job_creation_failure_surfaces_and_nothing_is_enqueued() {
    let jobs = InMemoryJobStore::new();
    let (queue, mut rx) = IngestQueue::new();
    let service = IngestService::new(jobs.clone(), queue.clone());

    jobs.fail_next_create();

    let result = service
        .start_ingest(request(Uuid::new_v4(), vec![asset_item("Mira", true, true)]))
        .await;

    assert!(matches!(result, Err(IngestError::JobCreation(_))));
    assert_eq!(jobs.create_calls(), 1);

    drop(queue);
    drop(service);
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn estimate_scales_with_expanded_item_count() {
    let jobs = InMemoryJobStore::new();
    let (queue, _rx) = IngestQueue::new();
    let service = IngestService::new(jobs.clone(), queue.clone());

    // 2 + 1 + 0 items across three assets
    let accepted = service
        .start_ingest(request(
            Uuid::new_v4(),
            vec![
                asset_item("Smaug", true, true),
                asset_item("Mira", false, true),
                asset_item("Ghost", false, false),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(accepted.item_count, 3);
    assert_eq!(accepted.asset_ids.len(), 3);

    let job = jobs.job(accepted.job_id);
    assert_eq!(job.estimated_duration, Duration::from_secs(90));
}
