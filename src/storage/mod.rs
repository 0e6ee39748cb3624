//! Object store gateway: named byte blobs in named buckets.

pub mod bucket;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bucket::BucketClient;
pub use memory::MemoryObjectStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid storage url: {0}")]
    InvalidUrl(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// One entry of a bucket listing. `name` is relative to the listed prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    pub size: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Direct children of `prefix` (empty for the bucket root).
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError>;

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Creates or replaces the object.
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError>;
}

/// Join a listing prefix and a relative name into an object path.
pub fn object_path(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths() {
        assert_eq!(object_path("", "a.txt"), "a.txt");
        assert_eq!(object_path("edicao_2024/", "a.txt"), "edicao_2024/a.txt");
        assert_eq!(object_path("/edicao_2024", "a.txt"), "edicao_2024/a.txt");
    }
}
