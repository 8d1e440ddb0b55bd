use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db::traits::{LedgerError, WriteOutcome},
    db_types::{BankCredit, BankTransfer},
};

/// Claims the provider transaction id for a credit that is about to be applied.
///
/// A fresh id, or one previously recorded as `UNMATCHED`, is stored as `MATCHED` and the row id returned.
/// `Rejected` means the id has already been matched, i.e. the credit was applied before.
pub async fn claim_matched(
    credit: &BankCredit,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WriteOutcome<i64>, LedgerError> {
    let id = sqlx::query_scalar(
        r#"INSERT INTO bank_transfers
            (provider_tx_id, bank, amount, reference_text, status, transferred_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 'MATCHED', $5, $6, $6)
        ON CONFLICT (provider_tx_id) DO UPDATE SET
            status = 'MATCHED',
            updated_at = excluded.updated_at
        WHERE bank_transfers.status = 'UNMATCHED'
        RETURNING id"#,
    )
    .bind(&credit.provider_tx_id)
    .bind(&credit.bank)
    .bind(credit.amount)
    .bind(&credit.reference_text)
    .bind(credit.transferred_at)
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(WriteOutcome::from_row(id))
}

pub async fn link_deposit(
    id: i64,
    deposit_id: i64,
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), LedgerError> {
    sqlx::query("UPDATE bank_transfers SET deposit_id = $1, user_id = $2 WHERE id = $3")
        .bind(deposit_id)
        .bind(user_id)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Records a credit that did not match anything. Returns false if the provider id was already known.
pub async fn insert_unmatched(
    credit: &BankCredit,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, LedgerError> {
    let result = sqlx::query(
        r#"INSERT INTO bank_transfers
            (provider_tx_id, bank, amount, reference_text, status, transferred_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 'UNMATCHED', $5, $6, $6)
        ON CONFLICT (provider_tx_id) DO NOTHING"#,
    )
    .bind(&credit.provider_tx_id)
    .bind(&credit.bank)
    .bind(credit.amount)
    .bind(&credit.reference_text)
    .bind(credit.transferred_at)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn is_matched(provider_tx_id: &str, conn: &mut SqliteConnection) -> Result<bool, LedgerError> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT 1 FROM bank_transfers WHERE provider_tx_id = $1 AND status = 'MATCHED'",
    )
    .bind(provider_tx_id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .is_some();
    Ok(found)
}

pub async fn fetch(provider_tx_id: &str, conn: &mut SqliteConnection) -> Result<Option<BankTransfer>, LedgerError> {
    let transfer = sqlx::query_as("SELECT * FROM bank_transfers WHERE provider_tx_id = $1")
        .bind(provider_tx_id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(transfer)
}

pub async fn unmatched(conn: &mut SqliteConnection) -> Result<Vec<BankTransfer>, LedgerError> {
    let transfers = sqlx::query_as("SELECT * FROM bank_transfers WHERE status = 'UNMATCHED' ORDER BY id ASC")
        .fetch_all(conn)
        .await?;
    Ok(transfers)
}
