use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::ingest::GenerationType;

const OUTPUT_FORMAT: &str = "png";

/// Classification of generated content. Decides canvas size and framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    ImagePortrait,
    ImageToken,
}

impl ContentKind {
    /// Canvas size requested from the generation API.
    fn size(self) -> &'static str {
        match self {
            ContentKind::ImagePortrait => "1024x1536",
            ContentKind::ImageToken => "1024x1024",
        }
    }

    /// Pixel dimensions of the generated canvas, (width, height).
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ContentKind::ImagePortrait => (1024, 1536),
            ContentKind::ImageToken => (1024, 1024),
        }
    }
}

impl From<GenerationType> for ContentKind {
    fn from(generation_type: GenerationType) -> Self {
        match generation_type {
            GenerationType::Portrait => ContentKind::ImagePortrait,
            GenerationType::Token => ContentKind::ImageToken,
        }
    }
}

/// A generated image with its pixel dimensions.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Contract for the external AI image generation service.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        kind: ContentKind,
        prompt: &str,
    ) -> Result<GeneratedImage, GenerationError>;
}

/// Client for the OpenAI image generation API.
pub struct OpenAiImageClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    output_format: &'a str,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    b64_json: String,
}

impl OpenAiImageClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            http: Client::new(),
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl GenerationClient for OpenAiImageClient {
    async fn generate(
        &self,
        kind: ContentKind,
        prompt: &str,
    ) -> Result<GeneratedImage, GenerationError> {
        let url = format!(
            "{}/v1/images/generations",
            self.base_url.trim_end_matches('/')
        );

        let request_body = ImageRequest {
            model: &self.model,
            prompt,
            output_format: OUTPUT_FORMAT,
            size: kind.size(),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(GenerationError::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status, body });
        }

        let image_resp: ImageResponse = response.json().await.map_err(GenerationError::Http)?;
        let first = image_resp
            .data
            .into_iter()
            .next()
            .ok_or(GenerationError::EmptyResponse)?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(first.b64_json.as_bytes())
            .map_err(GenerationError::Decode)?;

        let (width, height) = kind.dimensions();
        Ok(GeneratedImage {
            bytes,
            width,
            height,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Generation API returned no image data")]
    EmptyResponse,

    #[error("Failed to decode image payload: {0}")]
    Decode(#[from] base64::DecodeError),
}
