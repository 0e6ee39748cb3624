use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{ObjectInfo, ObjectStore, StorageError};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
    updated_at: DateTime<Utc>,
}

/// Object store held in process memory, for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<(String, String), StoredObject>>,
    unavailable: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, bucket: &str, path: &str, bytes: impl Into<Vec<u8>>) {
        self.objects.write().await.insert(
            (bucket.to_string(), path.to_string()),
            StoredObject {
                bytes: bytes.into(),
                content_type: "application/octet-stream".to_string(),
                updated_at: Utc::now(),
            },
        );
    }

    pub async fn content_type(&self, bucket: &str, path: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| o.content_type.clone())
    }

    /// Make every call fail, as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        self.ensure_available()?;
        let prefix = prefix.trim_matches('/');
        let objects = self.objects.read().await;

        Ok(objects
            .iter()
            .filter(|((b, _), _)| b == bucket)
            .filter_map(|((_, path), object)| {
                let name = if prefix.is_empty() {
                    path.as_str()
                } else {
                    path.strip_prefix(prefix)?.strip_prefix('/')?
                };
                if name.contains('/') {
                    return None;
                }
                Some(ObjectInfo {
                    name: name.to_string(),
                    size: Some(object.bytes.len() as u64),
                    updated_at: Some(object.updated_at),
                })
            })
            .collect())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        self.ensure_available()?;
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.ensure_available()?;
        self.objects.write().await.insert(
            (bucket.to_string(), path.to_string()),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        self.ensure_available()?;
        let mut objects = self.objects.write().await;
        for path in paths {
            objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}
