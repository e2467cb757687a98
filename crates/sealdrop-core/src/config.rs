use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SealError, SealResult};

/// Placeholder substituted with the manifest reference in `download_link`.
pub const LINK_PLACEHOLDER: &str = "{reference}";

/// Top-level client configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    pub storage: StorageConfig,
    pub transfer: TransferConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Swarm Bee HTTP gateway (`/bzz`)
    Swarm,
    /// S3-compatible bucket through OpenDAL
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: Backend,
    /// Swarm gateway API endpoint
    pub api_endpoint: String,
    /// Per-request timeout against the gateway
    pub timeout_secs: u64,
    /// S3 endpoint (backend = "s3")
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// S3 bucket name
    pub bucket: String,
    /// Key prefix blobs are stored under
    pub prefix: String,
    /// Refuse plaintext HTTP S3 endpoints
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Chunking threshold and piece size in MiB
    pub chunk_size_mb: usize,
    /// Encrypt uploads unless overridden on the command line
    pub encrypt_default: bool,
    /// Concurrent piece transfers (0 = cpu_count)
    pub concurrency: usize,
    /// Shareable link template, must contain `{reference}` exactly once
    pub download_link: String,
    /// Where downloads are written
    pub download_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Swarm,
            api_endpoint: "http://localhost:1633".into(),
            timeout_secs: 300,
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "sealdrop".into(),
            prefix: "sealdrop".into(),
            enforce_tls: false,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size_mb: 10,
            encrypt_default: true,
            concurrency: 4,
            download_link: format!("http://localhost:8080?download={LINK_PLACEHOLDER}"),
            download_dir: PathBuf::from("."),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl SealConfig {
    /// Read and validate a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> SealResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| SealError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> SealResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| SealError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> SealResult<String> {
        toml::to_string_pretty(self).map_err(|e| SealError::Config(e.to_string()))
    }

    pub fn validate(&self) -> SealResult<()> {
        if self.transfer.chunk_size_mb == 0 {
            return Err(SealError::Config(
                "transfer.chunk_size_mb must be greater than 0".into(),
            ));
        }
        let placeholders = self.transfer.download_link.matches(LINK_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(SealError::Config(format!(
                "transfer.download_link must contain {LINK_PLACEHOLDER} exactly once (found {placeholders})"
            )));
        }
        Ok(())
    }
}

impl TransferConfig {
    pub fn chunk_size_bytes(&self) -> usize {
        self.chunk_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.concurrency
        }
    }
}
