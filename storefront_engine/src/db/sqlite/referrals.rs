use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db::{sqlite::unique_violation_or, traits::LedgerError},
    db_types::{Referral, Vnd},
};

pub async fn insert(
    referrer_id: &str,
    referee_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Referral, LedgerError> {
    let referral = sqlx::query_as(
        r#"INSERT INTO referrals (referee_id, referrer_id, total_reward, created_at) VALUES ($1, $2, 0, $3)
        RETURNING *"#,
    )
    .bind(referee_id)
    .bind(referrer_id)
    .bind(now)
    .fetch_all(conn)
    .await
    .map_err(|e| {
        unique_violation_or(e, || LedgerError::ReferralError(format!("{referee_id} already has a referrer")))
    })?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(referral)
}

pub async fn fetch(referee_id: &str, conn: &mut SqliteConnection) -> Result<Option<Referral>, LedgerError> {
    let referral = sqlx::query_as("SELECT * FROM referrals WHERE referee_id = $1")
        .bind(referee_id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(referral)
}

pub async fn by_referrer(referrer_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Referral>, LedgerError> {
    let referrals = sqlx::query_as("SELECT * FROM referrals WHERE referrer_id = $1 ORDER BY created_at ASC")
        .bind(referrer_id)
        .fetch_all(conn)
        .await?;
    Ok(referrals)
}

pub async fn add_reward(referee_id: &str, reward: Vnd, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    sqlx::query("UPDATE referrals SET total_reward = total_reward + $1 WHERE referee_id = $2")
        .bind(reward)
        .bind(referee_id)
        .execute(conn)
        .await?;
    Ok(())
}
