use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::store::{StoreError, WalStore};

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact `store` if at least `threshold` appends have piled up since the last rewrite.
/// Returns whether a compaction ran.
pub async fn compact_if_due(store: &WalStore, threshold: u64) -> Result<bool, StoreError> {
    let appends = store.appends_since_compact().await;
    if appends < threshold {
        return Ok(false);
    }
    store.compact().await?;
    info!("compacted WAL after {appends} appends");
    Ok(true)
}

/// Background task that keeps the WAL from growing without bound.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_due(&store, threshold).await {
            tracing::error!("compaction failed: {e}");
        }
    }
}
