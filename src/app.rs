use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::admin::Admin;
use crate::booking::DraftStore;
use crate::config::Config;
use crate::engine::Engine;
use crate::flow::{BookingFlow, FlowConfig};
use crate::reaper;
use crate::repository::Repository;

const DRAFT_REAP_EVERY: Duration = Duration::from_secs(60);
const COMPACT_CHECK_EVERY: Duration = Duration::from_secs(30);

/// The running service: durable store, draft store, handlers, and the
/// background tasks that keep them tidy.
pub struct App {
    pub engine: Arc<Engine>,
    pub drafts: Arc<DraftStore>,
    pub flow: BookingFlow,
    pub admin: Admin,
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    /// Open (or create) the store under `config.data_dir`, seed configured
    /// rooms, and spawn the draft reaper and WAL compactor.
    pub async fn start(config: &Config) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        std::fs::create_dir_all(&config.data_dir)?;
        let engine = Arc::new(Engine::new(config.wal_path())?);
        let created = engine.seed_rooms(&config.rooms).await?;
        if created > 0 {
            info!("seeded {created} rooms");
        }

        let drafts = Arc::new(DraftStore::new());
        let repo: Arc<dyn Repository> = engine.clone();
        let flow = BookingFlow::new(
            repo.clone(),
            drafts.clone(),
            FlowConfig {
                repo_timeout: config.repo_timeout,
            },
        );
        let admin = Admin::new(repo, config.repo_timeout);

        let tasks = vec![
            tokio::spawn(reaper::run_draft_reaper(drafts.clone(), config.draft_ttl, DRAFT_REAP_EVERY)),
            tokio::spawn(reaper::run_compactor(
                engine.clone(),
                config.compact_threshold,
                COMPACT_CHECK_EVERY,
            )),
        ];

        Ok(Self {
            engine,
            drafts,
            flow,
            admin,
            tasks,
        })
    }

    /// Stop background tasks and leave a compact WAL behind.
    pub async fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        match self.engine.compact_wal().await {
            Ok(()) => info!("final compaction complete"),
            Err(e) => tracing::warn!("final compaction failed: {e}"),
        }
    }
}
