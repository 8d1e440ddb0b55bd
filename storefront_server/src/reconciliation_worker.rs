use std::{sync::Arc, time::Duration};

use log::*;
use storefront_engine::{bank_feeds::HttpBankFeed, objects::PollSummary, ReconciliationApi, SqliteDatabase};
use tokio::task::JoinHandle;

use crate::feed_watcher::{load_feeds, FeedWatcher};

pub type BankReconciler = ReconciliationApi<SqliteDatabase, HttpBankFeed>;

/// Starts the bank reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Before each poll the feed file, if there is one, is checked for changes and reloaded. A file that fails to load
/// leaves the current feeds in place.
pub fn start_reconciliation_worker(
    api: Arc<BankReconciler>,
    poll_interval: Duration,
    mut watcher: Option<FeedWatcher>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(poll_interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("🕰️ Bank reconciliation worker started. Polling every {}s", poll_interval.as_secs());
        loop {
            timer.tick().await;
            if let Some(w) = watcher.as_mut() {
                refresh_feeds(&api, w).await;
            }
            let summary = api.poll_bank_feeds().await;
            log_summary(&summary);
        }
    })
}

async fn refresh_feeds(api: &BankReconciler, watcher: &mut FeedWatcher) {
    if !watcher.has_changed() {
        return;
    }
    match load_feeds(watcher.path()) {
        Ok(feeds) => api.reload_feeds(feeds).await,
        Err(e) => error!("🕰️ Could not reload bank feeds. The current feeds stay in use. {e}"),
    }
}

fn log_summary(summary: &PollSummary) {
    for report in &summary.details {
        if let Some(err) = &report.error {
            warn!("🕰️ Bank feed '{}' was skipped this round. {err}", report.feed);
        }
    }
    if summary.processed > 0 || summary.failed > 0 {
        info!("🕰️ Bank poll complete. {} credits applied, {} failures", summary.processed, summary.failed);
    } else {
        debug!("🕰️ Bank poll complete. Nothing new");
    }
    if log_enabled!(Level::Trace) {
        match serde_json::to_string(&summary.details) {
            Ok(json) => trace!("🕰️ Poll details: {json}"),
            Err(e) => trace!("🕰️ Poll details could not be serialized. {e}"),
        }
    }
}
