use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Base URL of the OpenAI-compatible image generation API
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// API key for the image generation API
    pub openai_api_key: String,

    /// Image generation model name
    #[serde(default = "default_openai_image_model")]
    pub openai_image_model: String,

    /// Base URL of the asset service
    pub asset_service_url: String,

    /// API key for the asset service
    pub asset_service_api_key: String,

    /// R2 bucket name
    pub r2_bucket: String,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: String,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: String,

    /// R2 endpoint URL
    pub r2_endpoint: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_openai_image_model() -> String {
    "gpt-image-1".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
