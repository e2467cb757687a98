use bytes::Bytes;
use sealdrop_core::SealResult;

/// A content-addressed blob store reachable over the network.
///
/// References are opaque to callers. Implementations must be `Send + Sync`
/// so a single store can be shared by concurrent piece transfers.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a blob and return the reference it can be fetched by.
    async fn put(&self, data: Bytes) -> SealResult<String>;

    /// Fetch the blob previously stored under `reference`.
    async fn get(&self, reference: &str) -> SealResult<Bytes>;

    /// Cheap reachability probe.
    async fn health(&self) -> SealResult<()>;

    /// Short human-readable backend description for logs.
    fn describe(&self) -> String;
}
