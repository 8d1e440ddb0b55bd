use chrono::{DateTime, Utc};
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db::traits::LedgerError,
    db_types::{NewWalletTransaction, WalletTransaction},
};

/// Appends an entry to the wallet ledger. There is no update or delete counterpart; the table rejects both.
pub async fn append(
    entry: NewWalletTransaction,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, LedgerError> {
    let tx = sqlx::query_as(
        r#"INSERT INTO wallet_transactions (user_id, tx_type, amount, balance_after, description, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *"#,
    )
    .bind(entry.user_id)
    .bind(entry.tx_type)
    .bind(entry.amount)
    .bind(entry.balance_after)
    .bind(entry.description)
    .bind(Json(entry.metadata))
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(tx)
}

/// All entries for the user in the order they were committed.
pub async fn history(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<WalletTransaction>, LedgerError> {
    let entries = sqlx::query_as("SELECT * FROM wallet_transactions WHERE user_id = $1 ORDER BY id ASC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}

/// Returns the ledger entry that recorded the given bank transfer, if any.
pub async fn entry_for_provider_tx(
    provider_tx_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, LedgerError> {
    let entry = sqlx::query_as(
        r#"SELECT * FROM wallet_transactions
        WHERE tx_type = 'DEPOSIT' AND json_extract(metadata, '$.provider_tx_id') = $1
        ORDER BY id LIMIT 1"#,
    )
    .bind(provider_tx_id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(entry)
}
