use chrono::{DateTime, Utc};
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db::traits::{LedgerError, WriteOutcome},
    db_types::{NewOrder, Order, OrderStatusType},
};

pub async fn insert(order: NewOrder, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Order, LedgerError> {
    let total = order.total_amount();
    let order = sqlx::query_as(
        r#"INSERT INTO orders
            (user_id, status, subtotal, discount, total_amount, coupon_code, items, created_at, updated_at)
        VALUES ($1, 'PENDING', $2, $3, $4, $5, $6, $7, $7)
        RETURNING *"#,
    )
    .bind(order.user_id)
    .bind(order.subtotal)
    .bind(order.discount)
    .bind(total)
    .bind(order.coupon_code)
    .bind(Json(order.items))
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(order)
}

pub async fn fetch(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, LedgerError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(order)
}

pub async fn for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, LedgerError> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY id ASC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// `PENDING → PAID` for an order owned by `user_id`. `Rejected` if the order is not pending or belongs to someone
/// else.
pub async fn mark_paid(
    order_id: i64,
    user_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WriteOutcome<Order>, LedgerError> {
    let order = sqlx::query_as(
        r#"UPDATE orders SET status = 'PAID', paid_at = $1, updated_at = $1
        WHERE id = $2 AND user_id = $3 AND status = 'PENDING'
        RETURNING *"#,
    )
    .bind(now)
    .bind(order_id)
    .bind(user_id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(WriteOutcome::from_row(order))
}

/// Moves the order from `from` to `to`. A `Some` note replaces the review note.
pub async fn transition(
    order_id: i64,
    from: OrderStatusType,
    to: OrderStatusType,
    review_note: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WriteOutcome<Order>, LedgerError> {
    let order = sqlx::query_as(
        r#"UPDATE orders SET status = $1, review_note = COALESCE($2, review_note), updated_at = $3
        WHERE id = $4 AND status = $5
        RETURNING *"#,
    )
    .bind(to)
    .bind(review_note)
    .bind(now)
    .bind(order_id)
    .bind(from)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(WriteOutcome::from_row(order))
}

pub async fn expire_before(
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, LedgerError> {
    let orders = sqlx::query_as(
        r#"UPDATE orders SET status = 'EXPIRED', updated_at = $1
        WHERE status = 'PENDING' AND created_at < $2
        RETURNING *"#,
    )
    .bind(now)
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
