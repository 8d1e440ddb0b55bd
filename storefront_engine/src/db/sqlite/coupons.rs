use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db::{
        sqlite::unique_violation_or,
        traits::{LedgerError, WriteOutcome},
    },
    db_types::{Coupon, NewCoupon, Vnd},
};

pub async fn insert(coupon: NewCoupon, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Coupon, LedgerError> {
    let code = coupon.code.clone();
    let coupon = sqlx::query_as(
        r#"INSERT INTO coupons (code, discount_type, discount_value, max_discount, max_uses, used_count, min_order,
            start_date, expiry_date, active, created_at)
        VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $8, 1, $9)
        RETURNING *"#,
    )
    .bind(coupon.code)
    .bind(coupon.discount_type)
    .bind(coupon.discount_value)
    .bind(coupon.max_discount)
    .bind(coupon.max_uses)
    .bind(coupon.min_order)
    .bind(coupon.start_date)
    .bind(coupon.expiry_date)
    .bind(now)
    .fetch_all(conn)
    .await
    .map_err(|e| unique_violation_or(e, || LedgerError::ValidationError(format!("Coupon {code} already exists"))))?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(coupon)
}

pub async fn fetch(code: &str, conn: &mut SqliteConnection) -> Result<Option<Coupon>, LedgerError> {
    let coupon = sqlx::query_as("SELECT * FROM coupons WHERE code = $1")
        .bind(code)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(coupon)
}

/// Records one use of the coupon, provided it is active, inside its validity window, applies to an order of
/// `order_total` and has uses left. `Rejected` otherwise; see [`rejection_reason`].
pub async fn try_consume(
    code: &str,
    order_total: Vnd,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WriteOutcome<Coupon>, LedgerError> {
    let coupon = sqlx::query_as(
        r#"UPDATE coupons SET used_count = used_count + 1
        WHERE code = $1
            AND active = 1
            AND (max_uses IS NULL OR used_count < max_uses)
            AND (start_date IS NULL OR start_date <= $2)
            AND (expiry_date IS NULL OR expiry_date > $2)
            AND min_order <= $3
        RETURNING *"#,
    )
    .bind(code)
    .bind(now)
    .bind(order_total)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(WriteOutcome::from_row(coupon))
}

/// Works out why [`try_consume`] refused the coupon.
pub fn rejection_reason(coupon: Option<Coupon>, code: &str, order_total: Vnd, now: DateTime<Utc>) -> LedgerError {
    let not_applicable = |reason: String| LedgerError::CouponNotApplicable { code: code.to_string(), reason };
    let coupon = match coupon {
        None => return LedgerError::CouponNotFound(code.to_string()),
        Some(c) => c,
    };
    if !coupon.active {
        return not_applicable("The coupon is not active".into());
    }
    if coupon.start_date.map(|d| d > now).unwrap_or(false) {
        return not_applicable("The coupon is not valid yet".into());
    }
    if coupon.expiry_date.map(|d| d <= now).unwrap_or(false) {
        return not_applicable("The coupon has expired".into());
    }
    if order_total < coupon.min_order {
        return not_applicable(format!("The order total must be at least {}", coupon.min_order));
    }
    // Every other condition holds, so the usage ceiling was reached.
    LedgerError::ResourceExhausted(format!("Coupon {code} has no uses left"))
}

pub async fn set_active(code: &str, active: bool, conn: &mut SqliteConnection) -> Result<Option<Coupon>, LedgerError> {
    let coupon = sqlx::query_as("UPDATE coupons SET active = $1 WHERE code = $2 RETURNING *")
        .bind(active)
        .bind(code)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(coupon)
}
