use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking commits. Labels: status (ok, rejected, error).
pub const COMMITS_TOTAL: &str = "innkeep_commits_total";

/// Counter: availability queries. Labels: kind (room, all), result.
pub const SEARCHES_TOTAL: &str = "innkeep_searches_total";

/// Counter: submissions that failed guest-detail validation.
pub const VALIDATION_FAILURES_TOTAL: &str = "innkeep_validation_failures_total";

/// Histogram: repository call latency in seconds. Labels: op.
pub const REPO_CALL_DURATION_SECONDS: &str = "innkeep_repo_call_duration_seconds";

/// Counter: repository calls abandoned at the timeout. Labels: op.
pub const REPO_TIMEOUTS_TOTAL: &str = "innkeep_repo_timeouts_total";

/// Counter: administrative writes. Labels: action.
pub const ADMIN_ACTIONS_TOTAL: &str = "innkeep_admin_actions_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: sessions holding a draft.
pub const DRAFTS_ACTIVE: &str = "innkeep_drafts_active";

/// Counter: drafts dropped by the idle reaper.
pub const DRAFTS_EXPIRED_TOTAL: &str = "innkeep_drafts_expired_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Counter: WAL compactions. Labels: status.
pub const WAL_COMPACTIONS_TOTAL: &str = "innkeep_wal_compactions_total";

/// Install the fmt subscriber. `RUST_LOG`-style filtering is left to the
/// subscriber defaults.
pub fn init_tracing() {
    // A second install (tests, embedding) is not an error.
    let _ = tracing_subscriber::fmt().try_init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
