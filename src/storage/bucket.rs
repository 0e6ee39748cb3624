use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::{ObjectInfo, ObjectStore, StorageError};

const LIST_PAGE_SIZE: u32 = 1000;

/// Client for a Supabase-compatible storage REST API.
pub struct BucketClient {
    http: Client,
    base_url: Url,
    key: SecretString,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Option<ListedMetadata>,
}

#[derive(Debug, Deserialize)]
struct ListedMetadata {
    #[serde(default)]
    size: Option<u64>,
}

impl BucketClient {
    pub fn new(base_url: &str, key: SecretString) -> Result<Self, StorageError> {
        let base_url = Url::parse(base_url).map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(StorageError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            key,
        })
    }

    /// `{base}/storage/v1/object/<segments...>/<path segments...>`
    fn object_url(&self, segments: &[&str], path: Option<&str>) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidUrl(self.base_url.to_string()))?;
            parts.pop_if_empty().extend(["storage", "v1", "object"]).extend(segments);
            if let Some(path) = path {
                parts.extend(path.split('/').filter(|s| !s.is_empty()));
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.key.expose_secret();
        request.bearer_auth(key).header("apikey", key)
    }

    async fn check(response: Response, path: &str) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        // Missing objects come back as 404, or as 400 with a not_found body.
        if status == StatusCode::NOT_FOUND
            || (status == StatusCode::BAD_REQUEST && message.to_lowercase().contains("not_found"))
        {
            return Err(StorageError::NotFound(path.to_string()));
        }
        Err(StorageError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ObjectStore for BucketClient {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let url = self.object_url(&["list", bucket], None)?;
        let body = json!({
            "prefix": prefix.trim_matches('/'),
            "limit": LIST_PAGE_SIZE,
            "offset": 0,
            "sortBy": { "column": "name", "order": "asc" }
        });

        let response = self.authorized(self.http.post(url)).json(&body).send().await?;
        let listed: Vec<ListedObject> = Self::check(response, bucket).await?.json().await?;
        debug!(bucket, prefix, count = listed.len(), "Listed bucket");

        Ok(listed
            .into_iter()
            .map(|object| ObjectInfo {
                name: object.name,
                size: object.metadata.and_then(|m| m.size),
                updated_at: object.updated_at,
            })
            .collect())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.object_url(&[bucket], Some(path))?;
        let response = self.authorized(self.http.get(url)).send().await?;
        let bytes = Self::check(response, path).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let url = self.object_url(&[bucket], Some(path))?;
        let response = self
            .authorized(self.http.post(url))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        Self::check(response, path).await?;
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        let url = self.object_url(&[bucket], None)?;
        let response = self
            .authorized(self.http.delete(url))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        Self::check(response, bucket).await?;
        Ok(())
    }
}
