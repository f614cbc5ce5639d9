//! Application context: wires the Store, Identity Map, Job Orchestrator and Geocoder
//! together behind one root value threaded explicitly through the CLI (spec.md §9:
//! "no global variables are required").

use crate::config::AppConfig;
use crate::geocoder::Geocoder;
use crate::jobs::JobManager;
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<Store>,
    pub jobs: Arc<JobManager>,
    pub geocoder: Geocoder,
}

impl AppContext {
    pub async fn bootstrap(config: AppConfig) -> anyhow::Result<Self> {
        config.ensure_directories()?;

        let db_path = config.data_dir.join("kinmap.db");
        let store = Arc::new(Store::create(&db_path, config.blob_dir()).await?);
        let jobs = JobManager::new();
        let geocoder = Geocoder::spawn(
            store.conn().clone(),
            config.geocoder.endpoint.clone(),
            config.geocoder.user_agent.clone(),
            Duration::from_millis(config.geocoder.min_request_interval_ms),
        );

        info!(data_dir = %config.data_dir.display(), "application context ready");
        Ok(Self {
            config,
            store,
            jobs,
            geocoder,
        })
    }

    /// Cancels every active job, giving each a grace period to emit its terminal
    /// event, then closes the store (spec.md §5: shutdown sequence).
    pub async fn shutdown(&self) {
        self.jobs.shutdown(Duration::from_secs(5)).await;
        info!("application context shut down");
    }
}
