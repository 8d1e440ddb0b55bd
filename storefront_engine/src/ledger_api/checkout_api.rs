use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db::traits::{CouponManagement, InventoryManagement, LedgerError, OrderManagement, OrderPayment},
    db_types::{Delivery, NewOrder, Order, OrderItem, Vnd},
    events::{EventProducers, OrderPaidEvent, ShortfallEvent},
    ledger_api::{coupon_api::normalize_code, objects::OrderLine},
};

/// `CheckoutApi` takes an order from cart to delivery: placing it, paying for it out of the wallet, and the
/// after-sales states (expiry and manual review).
pub struct CheckoutApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B> CheckoutApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> CheckoutApi<B>
where B: OrderManagement + InventoryManagement + CouponManagement
{
    /// Prices the cart from the catalog and stores a `PENDING` order. If a coupon code is given, it is validated and
    /// consumed together with the insert.
    pub async fn place_order(
        &self,
        user_id: &str,
        lines: &[OrderLine],
        coupon_code: Option<&str>,
    ) -> Result<Order, LedgerError> {
        if lines.is_empty() {
            return Err(LedgerError::ValidationError("An order needs at least one item".into()));
        }
        let mut items = Vec::with_capacity(lines.len());
        let mut subtotal = Vnd::default();
        for line in lines {
            if line.quantity <= 0 {
                return Err(LedgerError::ValidationError(format!(
                    "Quantity for product #{} must be positive, got {}",
                    line.product_id, line.quantity
                )));
            }
            let product =
                self.db.fetch_product(line.product_id).await?.ok_or(LedgerError::ProductNotFound(line.product_id))?;
            let item = OrderItem { product_id: product.id, quantity: line.quantity, price: product.price };
            subtotal = item.line_total().and_then(|t| subtotal.checked_add(t)).ok_or_else(|| {
                LedgerError::InvalidAmount(format!("The order total for {user_id} is too large to represent"))
            })?;
            items.push(item);
        }
        let order = NewOrder {
            user_id: user_id.to_string(),
            items,
            subtotal,
            discount: Vnd::default(),
            coupon_code: coupon_code.map(normalize_code).filter(|c| !c.is_empty()),
        };
        let order = self.db.insert_order(order).await?;
        info!("📦️ {user_id} placed order #{} for {}", order.id, order.total_amount);
        Ok(order)
    }

    /// Pays for a `PENDING` order out of the user's wallet and hands out the stock.
    ///
    /// The debit, the status change, the ledger entry and the allocations commit together or not at all. Running out
    /// of stock does not fail the payment; the order is paid and the missing units are reported in
    /// [`OrderPayment::allocations`] and through the shortfall event.
    pub async fn pay_order(&self, order_id: i64, user_id: &str) -> Result<OrderPayment, LedgerError> {
        let payment = self.db.pay_order(order_id, user_id).await?;
        info!("📦️ Order #{order_id} paid by {user_id} ({})", payment.order.total_amount);
        self.producers.order_paid(OrderPaidEvent::new(payment.order.clone(), payment.payment.clone())).await;
        if payment.is_partial() {
            warn!("📦️ Order #{order_id} was paid but is short {} units", payment.shortfall());
            let event = ShortfallEvent { order: payment.order.clone(), allocations: payment.allocations.clone() };
            self.producers.shortfall(event).await;
        }
        Ok(payment)
    }

    pub async fn fetch_order(&self, order_id: i64) -> Result<Order, LedgerError> {
        self.db.fetch_order(order_id).await?.ok_or(LedgerError::OrderNotFound(order_id))
    }

    pub async fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, LedgerError> {
        self.db.orders_for_user(user_id).await
    }

    pub async fn fetch_deliveries(&self, order_id: i64) -> Result<Vec<Delivery>, LedgerError> {
        self.db.fetch_deliveries(order_id).await
    }

    /// Moves every `PENDING` order older than `older_than` to `EXPIRED`.
    pub async fn expire_stale_orders(&self, older_than: Duration) -> Result<Vec<Order>, LedgerError> {
        let cutoff = Utc::now() - older_than;
        let expired = self.db.expire_orders(cutoff).await?;
        if !expired.is_empty() {
            info!("📦️ {} unpaid orders placed before {cutoff} have expired", expired.len());
        }
        Ok(expired)
    }

    pub async fn flag_for_review(&self, order_id: i64, note: &str) -> Result<Order, LedgerError> {
        let order = self.db.flag_for_review(order_id, note).await?;
        info!("📦️ Order #{order_id} flagged for review: {note}");
        Ok(order)
    }

    pub async fn resolve_review(&self, order_id: i64) -> Result<Order, LedgerError> {
        let order = self.db.resolve_review(order_id).await?;
        info!("📦️ Review of order #{order_id} resolved");
        Ok(order)
    }
}
