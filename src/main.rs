use tracing::info;

use innkeep::app::App;
use innkeep::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    innkeep::observability::init_tracing();

    let config = Config::from_env()?;
    innkeep::observability::init(config.metrics_port).map_err(|e| e.to_string())?;

    let app = App::start(&config).await?;
    info!("innkeep store ready");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  rooms: {}", config.rooms.len());
    info!("  repo_timeout: {}ms", config.repo_timeout.as_millis());
    info!("  draft_ttl: {}s", config.draft_ttl.as_secs());
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    // Request handling is mounted by the embedding HTTP layer; the daemon
    // owns the store and its background tasks until told to stop.
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    info!("shutting down");
    app.shutdown().await;
    info!("shutdown complete");
    Ok(())
}
