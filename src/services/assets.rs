use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use crate::models::ingest::IngestStatus;

/// Contract for the external asset service.
///
/// The asset service owns asset records; this pipeline only pushes the
/// rolled-up ingest status and links generated token resources.
#[async_trait]
pub trait AssetServiceClient: Send + Sync {
    /// Push a new ingest status for an asset.
    async fn update_ingest_status(
        &self,
        asset_id: Uuid,
        status: IngestStatus,
    ) -> Result<(), AssetClientError>;

    /// Link a stored resource to an asset as a token.
    async fn add_token(&self, asset_id: Uuid, resource_id: Uuid) -> Result<(), AssetClientError>;
}

/// HTTP client for the asset service.
pub struct HttpAssetServiceClient {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct UpdateIngestStatusRequest {
    status: IngestStatus,
}

#[derive(Serialize)]
struct AddTokenRequest {
    resource_id: Uuid,
}

impl HttpAssetServiceClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: Client::new(),
            base_url,
            api_key,
        }
    }

    fn asset_url(&self, asset_id: Uuid, suffix: &str) -> String {
        format!(
            "{}/api/assets/{}/{}",
            self.base_url.trim_end_matches('/'),
            asset_id,
            suffix
        )
    }

    async fn check(response: reqwest::Response) -> Result<(), AssetClientError> {
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(AssetClientError::Api { status, body })
    }
}

#[async_trait]
impl AssetServiceClient for HttpAssetServiceClient {
    async fn update_ingest_status(
        &self,
        asset_id: Uuid,
        status: IngestStatus,
    ) -> Result<(), AssetClientError> {
        let response = self
            .http
            .patch(self.asset_url(asset_id, "ingest-status"))
            .bearer_auth(&self.api_key)
            .json(&UpdateIngestStatusRequest { status })
            .send()
            .await
            .map_err(AssetClientError::Http)?;

        Self::check(response).await
    }

    async fn add_token(&self, asset_id: Uuid, resource_id: Uuid) -> Result<(), AssetClientError> {
        let response = self
            .http
            .post(self.asset_url(asset_id, "tokens"))
            .bearer_auth(&self.api_key)
            .json(&AddTokenRequest { resource_id })
            .send()
            .await
            .map_err(AssetClientError::Http)?;

        Self::check(response).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Asset service error {status}: {body}")]
    Api { status: u16, body: String },
}
