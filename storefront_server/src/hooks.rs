//! Event hooks that the server installs. For now they only write to the log; a stock shortfall is logged at warn
//! level with the full allocation detail so that an operator can top up the pool and deliver by hand.
use log::*;
use storefront_engine::events::{EventHandlers, EventHooks};

/// Buffer size of each event channel.
pub const EVENT_BUFFER_SIZE: usize = 64;

pub fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_paid(|ev| {
            Box::pin(async move {
                info!(
                    "📬️ Order #{} paid by {}. {} debited, balance now {}",
                    ev.order.id, ev.order.user_id, ev.payment.amount, ev.payment.balance_after
                );
            })
        })
        .on_shortfall(|ev| {
            Box::pin(async move {
                let detail = serde_json::to_string(&ev.allocations).unwrap_or_else(|e| format!("<{e}>"));
                warn!(
                    "📬️ Order #{} for {} is short {} items and needs manual delivery. {detail}",
                    ev.order.id,
                    ev.order.user_id,
                    ev.total_shortfall()
                );
            })
        })
        .on_deposit_approved(|ev| {
            Box::pin(async move {
                let source =
                    ev.provider_tx_id.map(|id| format!("bank transfer {id}")).unwrap_or_else(|| "admin".into());
                info!(
                    "📬️ Deposit {} approved by {source}. {} credited to {}",
                    ev.deposit.reference_code, ev.transaction.amount, ev.deposit.user_id
                );
            })
        })
        .on_deposit_rejected(|ev| {
            Box::pin(async move {
                info!("📬️ Deposit {} for {} was rejected", ev.deposit.reference_code, ev.deposit.user_id);
            })
        })
        .on_wallet_adjusted(|ev| {
            Box::pin(async move {
                info!(
                    "📬️ Wallet of {} adjusted by {:?} {}. Balance now {}",
                    ev.wallet.user_id, ev.transaction.tx_type, ev.transaction.amount, ev.wallet.balance
                );
            })
        });
    hooks
}

/// Builds the handlers for [`logging_hooks`]. Call `producers()` before `start_handlers()`.
pub fn logging_handlers() -> EventHandlers {
    EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks())
}
