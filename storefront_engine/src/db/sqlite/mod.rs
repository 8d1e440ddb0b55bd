pub mod bank_transfers;
pub mod coupons;
pub mod deposits;
pub mod inventory;
pub mod ledger;
pub mod orders;
pub mod referrals;
pub mod wallets;

mod sqlite_impl;

use std::{env, str::FromStr, time::Duration};

use log::*;
pub use sqlite_impl::{SqliteDatabase, BANK_SYNC_ACTOR};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::db::traits::LedgerError;

const SQLITE_DB_URL: &str = "sqlite://data/storefront.db";
/// Writers queue behind each other for up to this long before giving up with SQLITE_BUSY.
const BUSY_TIMEOUT: Duration = Duration::from_secs(15);

pub fn db_url() -> String {
    let result = env::var("SFL_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ SFL_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, LedgerError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// Maps a unique-constraint violation to `on_conflict`, and any other driver error to [`LedgerError::DatabaseError`].
pub(crate) fn unique_violation_or<F>(e: sqlx::Error, on_conflict: F) -> LedgerError
where F: FnOnce() -> LedgerError {
    match e {
        sqlx::Error::Database(ref dbe) if dbe.is_unique_violation() => on_conflict(),
        e => LedgerError::from(e),
    }
}
