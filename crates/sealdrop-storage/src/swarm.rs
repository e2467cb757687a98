//! Swarm Bee HTTP gateway client
//!
//! Upload: `POST {api}/bzz` with an `application/octet-stream` body, answered
//! by `201 Created` and `{"reference": "<hex>"}`.
//! Download: `GET {api}/bzz/{reference}`, answered by `200 OK` and the bytes.

use bytes::Bytes;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use sealdrop_core::config::StorageConfig;
use sealdrop_core::{SealError, SealResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::store::ObjectStore;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    reference: String,
}

#[derive(Debug, Clone)]
pub struct SwarmStore {
    client: Client,
    api: String,
}

impl SwarmStore {
    pub fn new(api_endpoint: &str, timeout: Duration) -> SealResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SealError::Storage(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            api: api_endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &StorageConfig) -> SealResult<Self> {
        Self::new(&cfg.api_endpoint, Duration::from_secs(cfg.timeout_secs))
    }

    pub fn endpoint(&self) -> &str {
        &self.api
    }
}

/// References end up in a URL path, so path and query delimiters are refused.
fn check_reference(reference: &str) -> SealResult<()> {
    if reference.is_empty() || reference.contains(['/', '?', '#']) {
        return Err(SealError::Storage(format!(
            "invalid swarm reference: {reference:?}"
        )));
    }
    Ok(())
}

async fn error_body(resp: reqwest::Response) -> String {
    resp.text().await.unwrap_or_default()
}

#[async_trait::async_trait]
impl ObjectStore for SwarmStore {
    async fn put(&self, data: Bytes) -> SealResult<String> {
        let size = data.len();
        let resp = self
            .client
            .post(format!("{}/bzz", self.api))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| SealError::Storage(format!("upload request failed: {e}")))?;

        let status = resp.status();
        if status != StatusCode::CREATED {
            let body = error_body(resp).await;
            return Err(SealError::Storage(format!(
                "upload failed: {status} - {body}"
            )));
        }

        let parsed: UploadResponse = resp
            .json()
            .await
            .map_err(|e| SealError::Storage(format!("decoding upload response: {e}")))?;
        check_reference(&parsed.reference)?;

        debug!(reference = %parsed.reference, size, "stored blob on swarm");
        Ok(parsed.reference)
    }

    async fn get(&self, reference: &str) -> SealResult<Bytes> {
        check_reference(reference)?;

        let resp = self
            .client
            .get(format!("{}/bzz/{reference}", self.api))
            .send()
            .await
            .map_err(|e| SealError::Storage(format!("download request failed: {e}")))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = error_body(resp).await;
            return Err(SealError::Storage(format!(
                "download of {reference} failed: {status} - {body}"
            )));
        }

        let data = resp
            .bytes()
            .await
            .map_err(|e| SealError::Storage(format!("reading {reference}: {e}")))?;

        debug!(reference, size = data.len(), "fetched blob from swarm");
        Ok(data)
    }

    async fn health(&self) -> SealResult<()> {
        let resp = self
            .client
            .get(format!("{}/health", self.api))
            .send()
            .await
            .map_err(|e| SealError::Storage(format!("gateway unreachable: {e}")))?;

        if !resp.status().is_success() {
            return Err(SealError::Storage(format!(
                "gateway health check failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("swarm gateway {}", self.api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let store = SwarmStore::new("http://localhost:1633/", Duration::from_secs(5)).unwrap();
        assert_eq!(store.endpoint(), "http://localhost:1633");
    }

    #[test]
    fn test_from_config_uses_api_endpoint() {
        let cfg = StorageConfig {
            api_endpoint: "http://bee.internal:1633".into(),
            ..Default::default()
        };
        let store = SwarmStore::from_config(&cfg).unwrap();
        assert_eq!(store.describe(), "swarm gateway http://bee.internal:1633");
    }

    #[test]
    fn test_reference_with_path_chars_rejected() {
        assert!(check_reference("abc123").is_ok());
        for bad in ["", "../health", "abc?x=1", "abc#frag"] {
            assert!(check_reference(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
