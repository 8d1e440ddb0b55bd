use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::{
        sqlite::unique_violation_or,
        traits::{LedgerError, WriteOutcome},
    },
    db_types::{Vnd, Wallet},
};

pub async fn insert_wallet(
    user_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Wallet, LedgerError> {
    let wallet = sqlx::query_as(
        r#"INSERT INTO wallets (user_id, balance, created_at, updated_at) VALUES ($1, 0, $2, $2)
        RETURNING *"#,
    )
    .bind(user_id)
    .bind(now)
    .fetch_all(conn)
    .await
    .map_err(|e| unique_violation_or(e, || LedgerError::WalletAlreadyExists(user_id.to_string())))?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    trace!("💰️ Wallet created for {user_id}");
    Ok(wallet)
}

pub async fn fetch_wallet(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<Wallet>, LedgerError> {
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(wallet)
}

pub async fn wallet_exists(user_id: &str, conn: &mut SqliteConnection) -> Result<bool, LedgerError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM wallets WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next()
        .is_some();
    Ok(exists)
}

/// Finds the owner of the wallet whose user id equals `candidate`, ignoring case. Bank memos are frequently
/// upper-cased by the sending bank. When several wallets differ only by case, there is no owner.
pub async fn find_owner(candidate: &str, conn: &mut SqliteConnection) -> Result<Option<String>, LedgerError> {
    let mut owners = sqlx::query_scalar::<_, String>(
        "SELECT user_id FROM wallets WHERE user_id = $1 COLLATE NOCASE ORDER BY user_id",
    )
    .bind(candidate)
    .fetch_all(conn)
    .await?;
    if owners.len() > 1 {
        warn!("💰️ '{candidate}' names {} wallets that differ only by case: {}", owners.len(), owners.join(", "));
        return Ok(None);
    }
    Ok(owners.pop())
}

/// Unconditionally adds `amount` to the balance. `Rejected` means the wallet does not exist.
pub async fn credit(
    user_id: &str,
    amount: Vnd,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WriteOutcome<Wallet>, LedgerError> {
    let wallet = sqlx::query_as(
        r#"UPDATE wallets SET balance = balance + $1, updated_at = $2 WHERE user_id = $3
        RETURNING *"#,
    )
    .bind(amount)
    .bind(now)
    .bind(user_id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(WriteOutcome::from_row(wallet))
}

/// Subtracts `amount` from the balance, but only if the balance covers it. `Rejected` means the wallet does not exist
/// or holds less than `amount`.
pub async fn debit(
    user_id: &str,
    amount: Vnd,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WriteOutcome<Wallet>, LedgerError> {
    let wallet = sqlx::query_as(
        r#"UPDATE wallets SET balance = balance - $1, updated_at = $2 WHERE user_id = $3 AND balance >= $1
        RETURNING *"#,
    )
    .bind(amount)
    .bind(now)
    .bind(user_id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(WriteOutcome::from_row(wallet))
}

/// Debits the wallet, turning a rejected write into [`LedgerError::InsufficientFunds`] or
/// [`LedgerError::WalletNotFound`] as appropriate.
pub async fn debit_or_fail(
    user_id: &str,
    amount: Vnd,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Wallet, LedgerError> {
    match debit(user_id, amount, now, &mut *conn).await? {
        WriteOutcome::Applied(wallet) => Ok(wallet),
        WriteOutcome::Rejected => {
            if wallet_exists(user_id, conn).await? {
                debug!("💰️ Debit of {amount} rejected for {user_id}. Insufficient balance");
                Err(LedgerError::InsufficientFunds { user_id: user_id.to_string(), required: amount })
            } else {
                Err(LedgerError::WalletNotFound(user_id.to_string()))
            }
        },
    }
}

pub async fn credit_or_fail(
    user_id: &str,
    amount: Vnd,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Wallet, LedgerError> {
    credit(user_id, amount, now, conn).await?.applied().ok_or_else(|| LedgerError::WalletNotFound(user_id.to_string()))
}
