use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// How a stored resource is attached to an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceRole {
    Portrait,
    Token,
}

/// Metadata record for a generated media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub role: ResourceRole,
    /// Blob-storage path of the primary object.
    pub path: String,
    pub content_type: String,
    pub file_name: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub name: String,
    pub description: String,
}
