use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("config store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid usage snapshot: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key/value persistence used to mirror the governor state.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_config_value(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn upsert_config_value(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Process-local store, for tests and for running without a database.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.values.write().await.insert(key.to_string(), value.to_string());
        store
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get_config_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn upsert_config_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_upserts() {
        let store = MemoryConfigStore::new();
        assert!(store.get_config_value("k").await.unwrap().is_none());

        store.upsert_config_value("k", "1").await.unwrap();
        store.upsert_config_value("k", "2").await.unwrap();
        assert_eq!(store.get_config_value("k").await.unwrap().as_deref(), Some("2"));
    }
}
