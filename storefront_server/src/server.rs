use std::sync::Arc;

use log::*;
use storefront_engine::{ReconciliationApi, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    feed_watcher::FeedWatcher,
    hooks::logging_handlers,
    reconciliation_worker::start_reconciliation_worker,
};

/// Opens the database, starts the event handlers and both workers, and runs until Ctrl-C or until a worker dies.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await?;

    let handlers = logging_handlers();
    let producers = handlers.producers();
    handlers.start_handlers();

    let api = ReconciliationApi::new(db.clone(), Vec::new(), config.reconciliation.clone(), producers.clone())
        .with_referral_settings(config.referrals.clone());
    let watcher = config.bank_feeds_file.clone().map(FeedWatcher::new);
    let mut reconciler = start_reconciliation_worker(Arc::new(api), config.poll_interval, watcher);
    let mut expiry = start_expiry_worker(db.clone(), producers, config.unpaid_order_timeout);

    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            info!("🚀️ Shutdown requested");
            signal.map_err(ServerError::from)
        },
        r = &mut reconciler => Err(ServerError::WorkerStopped(format!("reconciliation worker: {r:?}"))),
        r = &mut expiry => Err(ServerError::WorkerStopped(format!("expiry worker: {r:?}"))),
    };
    reconciler.abort();
    expiry.abort();
    db.close().await;
    result
}
