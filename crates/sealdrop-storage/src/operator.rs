//! OpenDAL-backed object store (S3-compatible buckets, in-memory for tests)
//!
//! Blobs are content-addressed by their BLAKE3 hash at
//! `{prefix}/blobs/{hash}`; the hex hash is the reference handed back.

use anyhow::Context;
use bytes::Bytes;
use opendal::Operator;
use sealdrop_core::config::StorageConfig;
use sealdrop_core::{SealError, SealResult};
use tracing::debug;

use crate::store::ObjectStore;

/// Access credentials for an S3-compatible endpoint
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Build an OpenDAL Operator for any S3-compatible endpoint
///
/// Uses path-style addressing (default in opendal 0.55), which is required by
/// SeaweedFS and MinIO. Do NOT call enable_virtual_host_style() for these.
pub fn build_operator(cfg: &StorageConfig, creds: &S3Credentials) -> SealResult<Operator> {
    // opendal 0.55: S3 builder uses consuming pattern (methods take `self`, return `Self`)
    let builder = opendal::services::S3::default()
        .endpoint(&cfg.endpoint)
        .region(&cfg.region)
        .bucket(&cfg.bucket)
        .access_key_id(&creds.access_key_id)
        .secret_access_key(&creds.secret_access_key);

    let op = Operator::new(builder)
        .context("creating OpenDAL S3 operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}

/// Build the S3 store described by the config.
///
/// If `enforce_tls` is true and the endpoint uses HTTP, this returns an error.
/// Otherwise, a warning is logged for non-HTTPS endpoints.
pub fn build_from_config(cfg: &StorageConfig, creds: &S3Credentials) -> SealResult<OpendalStore> {
    if cfg.endpoint.starts_with("http://") {
        if cfg.enforce_tls {
            return Err(SealError::Config(format!(
                "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                cfg.endpoint
            )));
        }
        tracing::warn!(
            endpoint = %cfg.endpoint,
            "S3 endpoint uses plaintext HTTP; credentials are transmitted unencrypted. \
             Set storage.enforce_tls = true and use HTTPS in production."
        );
    }

    let op = build_operator(cfg, creds)?;
    Ok(OpendalStore::new(op, &cfg.prefix))
}

#[derive(Debug, Clone)]
pub struct OpendalStore {
    op: Operator,
    prefix: String,
}

impl OpendalStore {
    pub fn new(op: Operator, prefix: &str) -> Self {
        Self {
            op,
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    /// Process-local store, contents vanish on drop.
    pub fn memory() -> SealResult<Self> {
        let op = Operator::new(opendal::services::Memory::default())
            .context("creating in-memory operator")?
            .finish();
        Ok(Self::new(op, "sealdrop"))
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Object path a reference is stored at.
    pub fn blob_path(&self, reference: &str) -> String {
        if self.prefix.is_empty() {
            format!("blobs/{reference}")
        } else {
            format!("{}/blobs/{reference}", self.prefix)
        }
    }
}

fn check_reference(reference: &str) -> SealResult<()> {
    if reference.len() == blake3::OUT_LEN * 2 && reference.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(SealError::Storage(format!(
            "invalid blob reference: {reference:?}"
        )))
    }
}

#[async_trait::async_trait]
impl ObjectStore for OpendalStore {
    async fn put(&self, data: Bytes) -> SealResult<String> {
        let reference = blake3::hash(&data).to_hex().to_string();
        let path = self.blob_path(&reference);

        // Content-addressed: an existing object already holds these bytes
        if self.op.exists(&path).await.unwrap_or(false) {
            debug!(%reference, "dedup: blob already stored");
            return Ok(reference);
        }

        let size = data.len();
        self.op
            .write(&path, data)
            .await
            .map_err(|e| SealError::Storage(format!("writing {path}: {e}")))?;

        debug!(%reference, size, "stored blob");
        Ok(reference)
    }

    async fn get(&self, reference: &str) -> SealResult<Bytes> {
        check_reference(reference)?;
        let path = self.blob_path(reference);

        let buf = self
            .op
            .read(&path)
            .await
            .map_err(|e| SealError::Storage(format!("reading {path}: {e}")))?;
        Ok(buf.to_bytes())
    }

    async fn health(&self) -> SealResult<()> {
        // A list on the prefix root is the lightest round-trip
        let root = if self.prefix.is_empty() {
            "/".to_string()
        } else {
            format!("{}/", self.prefix)
        };
        self.op
            .list(&root)
            .await
            .map(|_| ())
            .map_err(|e| SealError::Storage(format!("storage health check failed: {e}")))
    }

    fn describe(&self) -> String {
        format!("opendal store at /{}", self.prefix)
    }
}
