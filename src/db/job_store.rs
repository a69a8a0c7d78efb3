use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::job::{Job, JobItem, JobItemStatus, JobStatus};

/// A job to create, with its expanded items.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub owner_id: Uuid,
    pub kind: String,
    pub estimated_duration: Duration,
    pub items: Vec<NewJobItem>,
}

#[derive(Debug, Clone)]
pub struct NewJobItem {
    pub index: i32,
    pub data: String,
}

/// Partial update of a job and/or specific items addressed by index.
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items: Vec<JobItemUpdate>,
}

#[derive(Debug, Clone, Default)]
pub struct JobItemUpdate {
    pub index: i32,
    pub status: Option<JobItemStatus>,
    pub result: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Persistence contract for ingest jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a Pending job with its items; returns the new job id.
    async fn create(&self, job: NewJob) -> Result<Uuid, JobStoreError>;

    /// Fetch a job with its items ordered by index.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>, JobStoreError>;

    /// Apply a partial update to the job row and/or the listed items.
    async fn update(&self, job_id: Uuid, update: JobUpdate) -> Result<(), JobStoreError>;
}

/// PostgreSQL-backed job store.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: NewJob) -> Result<Uuid, JobStoreError> {
        let job_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, owner_id, kind, status, estimated_seconds)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(job_id)
        .bind(job.owner_id)
        .bind(&job.kind)
        .bind(JobStatus::Pending.to_string())
        .bind(job.estimated_duration.as_secs() as i64)
        .execute(&mut *tx)
        .await?;

        for item in &job.items {
            sqlx::query(
                r#"
                INSERT INTO job_items (job_id, item_index, status, data)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(job_id)
            .bind(item.index)
            .bind(JobItemStatus::Pending.to_string())
            .bind(&item.data)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(job_id)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>, JobStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, kind, status, estimated_seconds, started_at, completed_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status = parse_status::<JobStatus>(row.try_get("status")?)?;
        let estimated_seconds: i64 = row.try_get("estimated_seconds")?;

        let item_rows = sqlx::query(
            r#"
            SELECT item_index, status, data, result, started_at, completed_at
            FROM job_items
            WHERE job_id = $1
            ORDER BY item_index ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(item_rows.len());
        for item_row in item_rows {
            items.push(JobItem {
                index: item_row.try_get("item_index")?,
                status: parse_status::<JobItemStatus>(item_row.try_get("status")?)?,
                data: item_row.try_get("data")?,
                result: item_row.try_get("result")?,
                started_at: item_row.try_get("started_at")?,
                completed_at: item_row.try_get("completed_at")?,
            });
        }

        Ok(Some(Job {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            kind: row.try_get("kind")?,
            status,
            estimated_duration: Duration::from_secs(estimated_seconds.max(0) as u64),
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            items,
        }))
    }

    async fn update(&self, job_id: Uuid, update: JobUpdate) -> Result<(), JobStoreError> {
        let mut tx = self.pool.begin().await?;

        if update.status.is_some() || update.started_at.is_some() || update.completed_at.is_some()
        {
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = COALESCE($2, status),
                    started_at = COALESCE($3, started_at),
                    completed_at = COALESCE($4, completed_at)
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(update.status.map(|s| s.to_string()))
            .bind(update.started_at)
            .bind(update.completed_at)
            .execute(&mut *tx)
            .await?;
        }

        for item in &update.items {
            sqlx::query(
                r#"
                UPDATE job_items
                SET status = COALESCE($3, status),
                    result = COALESCE($4, result),
                    started_at = COALESCE($5, started_at),
                    completed_at = COALESCE($6, completed_at)
                WHERE job_id = $1 AND item_index = $2
                "#,
            )
            .bind(job_id)
            .bind(item.index)
            .bind(item.status.map(|s| s.to_string()))
            .bind(item.result.as_deref())
            .bind(item.started_at)
            .bind(item.completed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn parse_status<T: std::str::FromStr>(value: String) -> Result<T, JobStoreError> {
    value
        .parse()
        .map_err(|_| JobStoreError::Corrupt(format!("unrecognized status value: {value}")))
}

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt job record: {0}")]
    Corrupt(String),

    #[error("{0}")]
    Unavailable(String),
}
