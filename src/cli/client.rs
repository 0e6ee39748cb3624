use anyhow::{anyhow, Context as _};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

/// Thin JSON client over the server's `{success, data}` envelope.
pub struct ApiClient {
    http: Client,
    base_url: url::Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let base_url = url::Url::parse(base_url).with_context(|| format!("invalid server URL: {}", base_url))?;
        Ok(Self {
            http: Client::new(),
            base_url,
            token,
        })
    }

    fn endpoint(&self, path: &str) -> anyhow::Result<url::Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid path: {}", path))
    }

    /// Status and parsed body, without interpreting either.
    pub async fn raw(&self, method: Method, path: &str, body: Option<&Value>) -> anyhow::Result<(StatusCode, Value)> {
        let mut request = self.http.request(method, self.endpoint(path)?);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("could not reach {}", self.base_url))?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    /// The `data` member of a successful response; the server's message otherwise.
    pub async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> anyhow::Result<Value> {
        let (status, body) = self.raw(method, path, body).await?;
        if status.is_success() {
            return Ok(body.get("data").cloned().unwrap_or(Value::Null));
        }

        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"));
        Err(anyhow!("{} ({})", message, status.as_u16()))
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<Value> {
        self.call(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.call(Method::POST, path, Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_onto_base() {
        let client = ApiClient::new("http://localhost:5000", None).unwrap();
        assert_eq!(
            client.endpoint("/api/admin/system/status").unwrap().as_str(),
            "http://localhost:5000/api/admin/system/status"
        );
    }

    #[test]
    fn rejects_invalid_base() {
        assert!(ApiClient::new("not a url", None).is_err());
    }
}
