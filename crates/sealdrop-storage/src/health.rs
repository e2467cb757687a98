//! Storage health check

use sealdrop_core::SealResult;
use tracing::{info, warn};

use crate::store::ObjectStore;

/// Verify the backend is reachable, logging the outcome
pub async fn check_health(store: &dyn ObjectStore) -> SealResult<()> {
    match store.health().await {
        Ok(()) => {
            info!(backend = %store.describe(), "storage reachable");
            Ok(())
        }
        Err(e) => {
            warn!(backend = %store.describe(), error = %e, "storage unreachable");
            Err(e)
        }
    }
}

/// Returns true if storage is reachable, false otherwise (non-panicking)
pub async fn is_healthy(store: &dyn ObjectStore) -> bool {
    check_health(store).await.is_ok()
}
