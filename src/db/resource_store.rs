use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::resource::ResourceMetadata;

/// Persistence contract for media resource records.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn add(&self, resource: ResourceMetadata) -> Result<(), ResourceStoreError>;
}

/// PostgreSQL-backed resource store.
pub struct PgResourceStore {
    pool: PgPool,
}

impl PgResourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceStore for PgResourceStore {
    async fn add(&self, resource: ResourceMetadata) -> Result<(), ResourceStoreError> {
        sqlx::query(
            r#"
            INSERT INTO resources
                (id, owner_id, role, path, content_type, file_name, file_size,
                 width, height, name, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(resource.id)
        .bind(resource.owner_id)
        .bind(resource.role.to_string())
        .bind(&resource.path)
        .bind(&resource.content_type)
        .bind(&resource.file_name)
        .bind(resource.file_size as i64)
        .bind(resource.width as i32)
        .bind(resource.height as i32)
        .bind(&resource.name)
        .bind(&resource.description)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Unavailable(String),
}
