//! In-memory cache of the reference texts fed to the assistant.
//!
//! Texts come from one object-store bucket. The full set is cached under
//! [`ALL_KEY`] until an administrator invalidates it; single files are cached
//! under their own names. There is no eviction.

pub mod decode;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::storage::{object_path, ObjectInfo, ObjectStore, StorageError};

pub use decode::{decode_text, DecodeError, TextEncoding};

/// Cache key of the full batch. Never a valid file name, since those carry the text suffix.
pub const ALL_KEY: &str = "all";

const UPLOAD_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to list bucket '{bucket}': {source}")]
    Listing {
        bucket: String,
        #[source]
        source: StorageError,
    },

    #[error("context file not found: {0}")]
    NotFound(String),

    #[error("failed to decode '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: DecodeError,
    },

    #[error("invalid context file name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone)]
enum CachedText {
    Batch(Vec<String>),
    Single(String),
}

impl CachedText {
    fn char_count(&self) -> usize {
        match self {
            CachedText::Batch(texts) => texts.iter().map(|t| t.chars().count()).sum(),
            CachedText::Single(text) => text.chars().count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheSummary {
    pub entries: usize,
    pub keys: Vec<String>,
    pub total_characters: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub name: String,
    pub size: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionCheck {
    pub bucket: String,
    pub object_count: usize,
}

pub struct ContextCache {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    suffix: String,
    entries: RwLock<HashMap<String, CachedText>>,
}

impl ContextCache {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            suffix: suffix.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn is_text(&self, name: &str) -> bool {
        name.ends_with(&self.suffix)
    }

    /// Accept `[A-Za-z0-9._-]` segments separated by `/`, ending with the text suffix.
    fn validate_name(&self, name: &str) -> Result<(), ContextError> {
        let valid_segments = name.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        });
        if valid_segments && self.is_text(name) && name.len() > self.suffix.len() {
            Ok(())
        } else {
            Err(ContextError::InvalidName(name.to_string()))
        }
    }

    async fn list_texts(&self, prefix: &str) -> Result<Vec<ObjectInfo>, ContextError> {
        let listed = self
            .store
            .list(&self.bucket, prefix)
            .await
            .map_err(|source| ContextError::Listing {
                bucket: self.bucket.clone(),
                source,
            })?;
        Ok(listed.into_iter().filter(|o| self.is_text(&o.name)).collect())
    }

    async fn fetch_text(&self, path: &str) -> Result<String, ContextError> {
        let bytes = self.store.download(&self.bucket, path).await.map_err(|e| match e {
            StorageError::NotFound(name) => ContextError::NotFound(name),
            other => ContextError::Storage(other),
        })?;
        let (text, encoding) = decode_text(&bytes).map_err(|source| ContextError::Decode {
            name: path.to_string(),
            source,
        })?;
        debug!(path, %encoding, chars = text.chars().count(), "Context file decoded");
        Ok(text)
    }

    /// Download every text file under `prefix`. Files that fail are logged and skipped.
    async fn fetch_all(&self, prefix: &str) -> Result<Vec<String>, ContextError> {
        let files = self.list_texts(prefix).await?;
        let paths: Vec<String> = files.iter().map(|f| object_path(prefix, &f.name)).collect();
        let results = join_all(paths.iter().map(|path| self.fetch_text(path))).await;

        let mut texts = Vec::with_capacity(results.len());
        for (path, result) in paths.iter().zip(results) {
            match result {
                Ok(text) => texts.push(text),
                Err(e) => warn!(path = %path, error = %e, "Skipping context file"),
            }
        }
        Ok(texts)
    }

    /// All text files at the bucket root, cached after the first successful load.
    pub async fn load_all(&self) -> Result<Vec<String>, ContextError> {
        if let Some(CachedText::Batch(texts)) = self.entries.read().await.get(ALL_KEY) {
            return Ok(texts.clone());
        }

        let texts = self.fetch_all("").await?;
        info!(bucket = %self.bucket, count = texts.len(), "Context files loaded");
        self.entries
            .write()
            .await
            .insert(ALL_KEY.to_string(), CachedText::Batch(texts.clone()));
        Ok(texts)
    }

    /// Text files of one fair edition, stored under `edicao_{year}/`. Not cached.
    pub async fn load_year(&self, year: i32) -> Result<Vec<String>, ContextError> {
        let prefix = format!("edicao_{}", year);
        let texts = self.fetch_all(&prefix).await?;
        info!(bucket = %self.bucket, year, count = texts.len(), "Edition context files loaded");
        Ok(texts)
    }

    pub async fn load_one(&self, name: &str) -> Result<String, ContextError> {
        self.validate_name(name)?;
        if let Some(CachedText::Single(text)) = self.entries.read().await.get(name) {
            return Ok(text.clone());
        }

        let text = self.fetch_text(name).await?;
        self.entries
            .write()
            .await
            .insert(name.to_string(), CachedText::Single(text.clone()));
        Ok(text)
    }

    /// Store a text file and cache it. The full batch is dropped so the next
    /// [`load_all`](Self::load_all) sees the new file.
    pub async fn upload(&self, name: &str, content: &str) -> Result<UploadReceipt, ContextError> {
        self.validate_name(name)?;
        let bytes = content.as_bytes().to_vec();
        let receipt = UploadReceipt {
            name: name.to_string(),
            size: bytes.len(),
            sha256: format!("{:x}", Sha256::digest(&bytes)),
        };

        self.store
            .upload(&self.bucket, name, bytes, UPLOAD_CONTENT_TYPE)
            .await?;

        let mut entries = self.entries.write().await;
        entries.remove(ALL_KEY);
        entries.insert(name.to_string(), CachedText::Single(content.to_string()));
        info!(bucket = %self.bucket, name, size = receipt.size, "Context file uploaded");
        Ok(receipt)
    }

    pub async fn delete(&self, name: &str) -> Result<(), ContextError> {
        self.validate_name(name)?;
        self.store.remove(&self.bucket, &[name.to_string()]).await?;

        let mut entries = self.entries.write().await;
        entries.remove(name);
        entries.remove(ALL_KEY);
        info!(bucket = %self.bucket, name, "Context file deleted");
        Ok(())
    }

    pub async fn list_available(&self) -> Result<Vec<ObjectInfo>, ContextError> {
        self.list_texts("").await
    }

    pub async fn invalidate(&self) {
        self.entries.write().await.clear();
        info!(bucket = %self.bucket, "Context cache cleared");
    }

    pub async fn summary(&self) -> CacheSummary {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        CacheSummary {
            entries: entries.len(),
            keys,
            total_characters: entries.values().map(CachedText::char_count).sum(),
        }
    }

    pub async fn check_connection(&self) -> Result<ConnectionCheck, ContextError> {
        let listed = self
            .store
            .list(&self.bucket, "")
            .await
            .map_err(|source| ContextError::Listing {
                bucket: self.bucket.clone(),
                source,
            })?;
        Ok(ConnectionCheck {
            bucket: self.bucket.clone(),
            object_count: listed.len(),
        })
    }
}
