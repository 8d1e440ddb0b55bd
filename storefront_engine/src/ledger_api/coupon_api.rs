use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db::traits::{CouponManagement, CouponRedemption, LedgerError},
    db_types::{Coupon, DiscountType, NewCoupon, Vnd},
};

pub struct CouponApi<B> {
    db: B,
}

impl<B> Debug for CouponApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CouponApi")
    }
}

impl<B> CouponApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

/// Coupon codes are matched case-insensitively by storing them upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl<B> CouponApi<B>
where B: CouponManagement
{
    pub async fn create_coupon(&self, mut coupon: NewCoupon) -> Result<Coupon, LedgerError> {
        coupon.code = normalize_code(&coupon.code);
        if coupon.code.is_empty() {
            return Err(LedgerError::ValidationError("Coupon code cannot be empty".into()));
        }
        match coupon.discount_type {
            DiscountType::Percentage if !(1..=100).contains(&coupon.discount_value) => {
                return Err(LedgerError::ValidationError(format!(
                    "Percentage discounts must be between 1 and 100, got {}",
                    coupon.discount_value
                )));
            },
            DiscountType::Fixed if coupon.discount_value <= 0 => {
                return Err(LedgerError::ValidationError("Fixed discounts must be positive".into()));
            },
            _ => {},
        }
        if matches!(coupon.max_uses, Some(n) if n < 0) {
            return Err(LedgerError::ValidationError("max_uses cannot be negative".into()));
        }
        if let (Some(start), Some(end)) = (coupon.start_date, coupon.expiry_date) {
            if end <= start {
                return Err(LedgerError::ValidationError("Coupon expires before it starts".into()));
            }
        }
        self.db.create_coupon(coupon).await
    }

    pub async fn fetch_coupon(&self, code: &str) -> Result<Coupon, LedgerError> {
        let code = normalize_code(code);
        self.db.fetch_coupon(&code).await?.ok_or(LedgerError::CouponNotFound(code))
    }

    /// Checks that the coupon applies to an order of `order_total` and uses it up once.
    ///
    /// Fails with [`LedgerError::ResourceExhausted`] once `max_uses` redemptions have been made, however many callers
    /// race for the last one.
    pub async fn validate_and_consume(&self, code: &str, order_total: Vnd) -> Result<CouponRedemption, LedgerError> {
        let code = normalize_code(code);
        let redemption = self.db.consume_coupon(&code, order_total, Utc::now()).await?;
        debug!("🎟️ Coupon {code} redeemed. {} off {order_total}", redemption.discount);
        Ok(redemption)
    }

    pub async fn deactivate(&self, code: &str) -> Result<Coupon, LedgerError> {
        self.db.set_coupon_active(&normalize_code(code), false).await
    }

    pub async fn activate(&self, code: &str) -> Result<Coupon, LedgerError> {
        self.db.set_coupon_active(&normalize_code(code), true).await
    }
}
