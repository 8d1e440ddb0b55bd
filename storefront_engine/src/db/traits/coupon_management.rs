use chrono::{DateTime, Utc};

use crate::{
    db::traits::{CouponRedemption, LedgerError},
    db_types::{Coupon, NewCoupon, Vnd},
};

/// Coupons are bounded counters: a use is only recorded while the usage count is below the ceiling.
#[allow(async_fn_in_trait)]
pub trait CouponManagement: Clone {
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, LedgerError>;

    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, LedgerError>;

    /// Validates the coupon against `order_total` at time `now` and, if it applies, consumes one use.
    async fn consume_coupon(
        &self,
        code: &str,
        order_total: Vnd,
        now: DateTime<Utc>,
    ) -> Result<CouponRedemption, LedgerError>;

    async fn set_coupon_active(&self, code: &str, active: bool) -> Result<Coupon, LedgerError>;
}
