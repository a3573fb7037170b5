//! bizsync server - main entry point

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bizsync_common::logging::{init_logging, LogConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use bizsync_server::{
    api::{self, AppState},
    config::Config,
    db,
    import::{Importer, PgCompanyStore},
    queue::QueueWorker,
};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("bizsync-server".to_string())
        .filter_directives("bizsync_server=debug,tower_http=debug,sqlx=warn".to_string())
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting bizsync server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}",
        config.bind_address()
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let store = Arc::new(PgCompanyStore::new(pool));
    let importer = Importer::new(store);
    let shutdown = CancellationToken::new();

    let worker_handle = if config.queue.enabled {
        let worker = QueueWorker::new(config.queue.clone(), importer.clone());
        worker.ensure_layout().await?;
        Some(worker.spawn(shutdown.clone()))
    } else {
        info!("Queue worker is disabled (QUEUE_ENABLED=false)");
        None
    };

    let state = AppState {
        reconciler: importer.reconciler().clone(),
    };

    let served = api::serve(&config, state, shutdown.clone()).await;
    shutdown.cancel();

    if let Some(handle) = worker_handle {
        api::join_with_timeout(handle, Duration::from_secs(config.server.shutdown_timeout_secs))
            .await;
    }

    served
}
