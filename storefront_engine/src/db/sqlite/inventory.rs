use chrono::{DateTime, Utc};
use log::*;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db::traits::{LedgerError, WriteOutcome},
    db_types::{AllocationResult, Delivery, License, NewProduct, Product, ProductKind},
};

pub async fn insert_product(
    product: NewProduct,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Product, LedgerError> {
    let product = sqlx::query_as(
        r#"INSERT INTO products (name, price, kind, total_lines, used_lines, created_at, updated_at)
        VALUES ($1, $2, $3, 0, 0, $4, $4)
        RETURNING *"#,
    )
    .bind(product.name)
    .bind(product.price)
    .bind(product.kind)
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(product)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, LedgerError> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(product)
}

/// Touches the product row and returns it. Issued as the first statement of an allocation so that the transaction
/// holds the write lock before any stock is read.
pub async fn lock_product(
    product_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Product, LedgerError> {
    let product = sqlx::query_as("UPDATE products SET updated_at = $1 WHERE id = $2 RETURNING *")
        .bind(now)
        .bind(product_id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    product.ok_or(LedgerError::ProductNotFound(product_id))
}

pub async fn append_lines(
    product_id: i64,
    lines: &[String],
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Product, LedgerError> {
    let count = lines.len() as i64;
    let product: Option<Product> = sqlx::query_as(
        r#"UPDATE products SET total_lines = total_lines + $1, updated_at = $2
        WHERE id = $3 AND kind = 'LINES'
        RETURNING *"#,
    )
    .bind(count)
    .bind(now)
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .next();
    let product = match product {
        Some(p) => p,
        None => {
            return match fetch_product(product_id, conn).await? {
                None => Err(LedgerError::ProductNotFound(product_id)),
                Some(p) => Err(LedgerError::ValidationError(format!(
                    "Product #{product_id} is a {} product and does not take stock lines",
                    p.kind
                ))),
            }
        },
    };
    let first_line_no = product.total_lines - count + 1;
    for (i, content) in lines.iter().enumerate() {
        sqlx::query("INSERT INTO stock_lines (product_id, line_no, content) VALUES ($1, $2, $3)")
            .bind(product_id)
            .bind(first_line_no + i as i64)
            .bind(content)
            .execute(&mut *conn)
            .await?;
    }
    trace!("🗃️ {count} lines added to product #{product_id}. Stock is now {}", product.remaining_lines());
    Ok(product)
}

pub async fn insert_licenses(
    product_id: i64,
    keys: &[String],
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<License>, LedgerError> {
    let product = lock_product(product_id, now, &mut *conn).await?;
    if product.kind != ProductKind::Licenses {
        return Err(LedgerError::ValidationError(format!(
            "Product #{product_id} is a {} product and does not take license keys",
            product.kind
        )));
    }
    let mut result = Vec::with_capacity(keys.len());
    for key in keys {
        let license: Option<License> = sqlx::query_as(
            r#"INSERT INTO licenses (product_id, license_key, status, created_at) VALUES ($1, $2, 'NEW', $3)
            ON CONFLICT (license_key) DO NOTHING
            RETURNING *"#,
        )
        .bind(product_id)
        .bind(key)
        .bind(now)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .next();
        match license {
            Some(l) => result.push(l),
            None => warn!("🗃️ License key for product #{product_id} already exists. Skipping it."),
        }
    }
    Ok(result)
}

pub async fn count_available_licenses(product_id: i64, conn: &mut SqliteConnection) -> Result<i64, LedgerError> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM licenses WHERE product_id = $1 AND status = 'NEW'")
        .bind(product_id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next()
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok(count)
}

/// Binds up to `quantity` `NEW` licenses, oldest first, to the buyer. Each row is only flipped if it is still `NEW`,
/// so the returned licenses are exactly the ones this call won.
pub async fn bind_licenses(
    product_id: i64,
    quantity: i64,
    order_id: Option<i64>,
    buyer_ref: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<License>, LedgerError> {
    let mut licenses: Vec<License> = sqlx::query_as(
        r#"UPDATE licenses SET status = 'BOUND', order_id = $1, bound_to = $2, bound_at = $3
        WHERE id IN (
            SELECT id FROM licenses WHERE product_id = $4 AND status = 'NEW' ORDER BY id ASC LIMIT $5
        ) AND status = 'NEW'
        RETURNING *"#,
    )
    .bind(order_id)
    .bind(buyer_ref)
    .bind(now)
    .bind(product_id)
    .bind(quantity)
    .fetch_all(conn)
    .await?;
    licenses.sort_by_key(|l| l.id);
    Ok(licenses)
}

/// Moves the line cursor from `expected_used` to `expected_used + take`. `Rejected` means the cursor was moved by
/// someone else, or there are fewer than `take` lines left.
pub async fn advance_line_cursor(
    product_id: i64,
    expected_used: i64,
    take: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WriteOutcome<()>, LedgerError> {
    let result = sqlx::query(
        r#"UPDATE products SET used_lines = used_lines + $1, updated_at = $2
        WHERE id = $3 AND used_lines = $4 AND used_lines + $1 <= total_lines"#,
    )
    .bind(take)
    .bind(now)
    .bind(product_id)
    .bind(expected_used)
    .execute(conn)
    .await?;
    Ok(if result.rows_affected() == 1 { WriteOutcome::Applied(()) } else { WriteOutcome::Rejected })
}

/// Lines `(after, up_to]` of the product, in order.
pub async fn read_lines(
    product_id: i64,
    after: i64,
    up_to: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<String>, LedgerError> {
    let lines = sqlx::query_scalar(
        r#"SELECT content FROM stock_lines WHERE product_id = $1 AND line_no > $2 AND line_no <= $3
        ORDER BY line_no ASC"#,
    )
    .bind(product_id)
    .bind(after)
    .bind(up_to)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

/// Hands out up to `quantity` units of the product. Must run inside a transaction; the product row is written first.
pub async fn allocate(
    product_id: i64,
    quantity: i64,
    order_id: Option<i64>,
    buyer_ref: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<AllocationResult, LedgerError> {
    let product = lock_product(product_id, now, &mut *conn).await?;
    if quantity <= 0 {
        return Ok(AllocationResult::new(product_id, 0, vec![]));
    }
    let content = match product.kind {
        ProductKind::Licenses => bind_licenses(product_id, quantity, order_id, buyer_ref, now, conn)
            .await?
            .into_iter()
            .map(|l| l.license_key)
            .collect(),
        ProductKind::Lines => allocate_lines(product, quantity, now, conn).await?,
    };
    let result = AllocationResult::new(product_id, quantity, content);
    if result.shortfall > 0 {
        warn!(
            "🗃️ Product #{product_id} is short. {} of {quantity} delivered to {buyer_ref}",
            result.delivered
        );
    } else {
        trace!("🗃️ {quantity} units of product #{product_id} delivered to {buyer_ref}");
    }
    Ok(result)
}

/// Takes up to `quantity` lines off the cursor. The caller has already locked the product row in this transaction,
/// so the cursor read from it is current. A cursor that does not move is reported as a full shortfall.
async fn allocate_lines(
    product: Product,
    quantity: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<String>, LedgerError> {
    let product_id = product.id;
    let used = product.used_lines;
    let take = quantity.min(product.remaining_lines());
    if take <= 0 {
        return Ok(vec![]);
    }
    match advance_line_cursor(product_id, used, take, now, &mut *conn).await? {
        WriteOutcome::Applied(()) => read_lines(product_id, used, used + take, conn).await,
        WriteOutcome::Rejected => {
            warn!("🗃️ Line cursor for product #{product_id} did not move from {used}. Nothing delivered.");
            Ok(vec![])
        },
    }
}

pub async fn insert_delivery(
    order_id: i64,
    allocation: &AllocationResult,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Delivery, LedgerError> {
    let delivery = sqlx::query_as(
        r#"INSERT INTO deliveries (order_id, product_id, requested, delivered, shortfall, content, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *"#,
    )
    .bind(order_id)
    .bind(allocation.product_id)
    .bind(allocation.requested)
    .bind(allocation.delivered)
    .bind(allocation.shortfall)
    .bind(Json(&allocation.content))
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(delivery)
}

pub async fn fetch_deliveries(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Delivery>, LedgerError> {
    let deliveries = sqlx::query_as("SELECT * FROM deliveries WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(deliveries)
}
