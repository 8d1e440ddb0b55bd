use chrono::Duration;
use log::*;
use storefront_engine::{db_types::Order, events::EventProducers, CheckoutApi, SqliteDatabase};
use tokio::task::JoinHandle;

const EXPIRY_CHECK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_expiry_worker(db: SqliteDatabase, producers: EventProducers, unpaid_expiry: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(EXPIRY_CHECK_INTERVAL);
        let api = CheckoutApi::new(db, producers);
        info!("🕰️ Unpaid order expiry worker started. Orders expire after {} hrs", unpaid_expiry.num_hours());
        loop {
            timer.tick().await;
            debug!("🕰️ Running unpaid order expiry job");
            match api.expire_stale_orders(unpaid_expiry).await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No orders expired"),
                Ok(expired) => {
                    info!("🕰️ {} orders expired", expired.len());
                    debug!("🕰️ Expired orders: {}", order_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running unpaid order expiry job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[#{}] user: {} total: {}", o.id, o.user_id, o.total_amount))
        .collect::<Vec<String>>()
        .join(", ")
}
