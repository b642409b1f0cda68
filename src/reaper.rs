use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::booking::DraftStore;
use crate::engine::Engine;
use crate::observability::WAL_COMPACTIONS_TOTAL;

/// Background task that periodically drops drafts idle for longer than `ttl`.
pub async fn run_draft_reaper(drafts: Arc<DraftStore>, ttl: Duration, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        reap_drafts(&drafts, ttl);
    }
}

fn reap_drafts(drafts: &DraftStore, ttl: Duration) -> usize {
    let expired = drafts.expire_idle(Instant::now(), ttl);
    if expired > 0 {
        info!("expired {expired} idle drafts");
    }
    expired
}

/// Background task that rewrites the WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        compact_if_needed(&engine, threshold).await;
    }
}

/// Returns whether a compaction ran.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => {
            metrics::counter!(WAL_COMPACTIONS_TOTAL, "status" => "ok").increment(1);
            info!("compacted WAL after {appends} appends");
        }
        Err(e) => {
            metrics::counter!(WAL_COMPACTIONS_TOTAL, "status" => "error").increment(1);
            error!("WAL compaction failed: {e}");
        }
    }
    true
}
