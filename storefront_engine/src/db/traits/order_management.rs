use chrono::{DateTime, Utc};

use crate::{
    db::traits::{LedgerError, OrderPayment},
    db_types::{NewOrder, Order},
};

#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Stores a new `PENDING` order. If the order carries a coupon code, the coupon's usage counter is consumed in the
    /// same transaction, and the order is not stored if the coupon cannot be used.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, LedgerError>;

    async fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, LedgerError>;

    /// Pays for a `PENDING` order out of the owner's wallet. In one transaction the order is marked `PAID`, the wallet
    /// is debited, a `PURCHASE` entry is appended and stock is allocated for every line. If any step fails, nothing is
    /// changed. Running short of stock does not fail the payment.
    async fn pay_order(&self, order_id: i64, user_id: &str) -> Result<OrderPayment, LedgerError>;

    /// Marks every `PENDING` order created before `cutoff` as `EXPIRED` and returns them.
    async fn expire_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, LedgerError>;

    /// `PAID → REVIEW_REQUIRED`
    async fn flag_for_review(&self, order_id: i64, note: &str) -> Result<Order, LedgerError>;

    /// `REVIEW_REQUIRED → PAID`
    async fn resolve_review(&self, order_id: i64) -> Result<Order, LedgerError>;
}
