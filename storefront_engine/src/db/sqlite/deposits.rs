use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db::{
        sqlite::unique_violation_or,
        traits::{LedgerError, WriteOutcome},
    },
    db_types::{DepositRequest, DepositStatus, NewDepositRequest},
};

pub async fn insert(
    request: NewDepositRequest,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<DepositRequest, LedgerError> {
    let code = request.reference_code.clone();
    let deposit = sqlx::query_as(
        r#"INSERT INTO deposit_requests (user_id, amount, status, reference_code, note, created_at)
        VALUES ($1, $2, 'PENDING', $3, $4, $5)
        RETURNING *"#,
    )
    .bind(request.user_id)
    .bind(request.amount)
    .bind(request.reference_code)
    .bind(request.note)
    .bind(now)
    .fetch_all(conn)
    .await
    .map_err(|e| unique_violation_or(e, || LedgerError::ValidationError(format!("Reference code {code} is in use"))))?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(deposit)
}

/// Inserts a request that is approved from the start. Used when a bank credit arrives without a matching request.
pub async fn insert_approved(
    request: NewDepositRequest,
    decided_by: &str,
    admin_note: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<DepositRequest, LedgerError> {
    let code = request.reference_code.clone();
    let deposit = sqlx::query_as(
        r#"INSERT INTO deposit_requests
            (user_id, amount, status, reference_code, note, admin_note, decided_by, decided_at, created_at)
        VALUES ($1, $2, 'APPROVED', $3, $4, $5, $6, $7, $7)
        RETURNING *"#,
    )
    .bind(request.user_id)
    .bind(request.amount)
    .bind(request.reference_code)
    .bind(request.note)
    .bind(admin_note)
    .bind(decided_by)
    .bind(now)
    .fetch_all(conn)
    .await
    .map_err(|e| unique_violation_or(e, || LedgerError::ValidationError(format!("Reference code {code} is in use"))))?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(deposit)
}

pub async fn fetch(id: i64, conn: &mut SqliteConnection) -> Result<Option<DepositRequest>, LedgerError> {
    let deposit = sqlx::query_as("SELECT * FROM deposit_requests WHERE id = $1")
        .bind(id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(deposit)
}

pub async fn fetch_by_reference(
    reference_code: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<DepositRequest>, LedgerError> {
    let deposit = sqlx::query_as("SELECT * FROM deposit_requests WHERE reference_code = $1 COLLATE NOCASE")
        .bind(reference_code)
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(deposit)
}

pub async fn pending(conn: &mut SqliteConnection) -> Result<Vec<DepositRequest>, LedgerError> {
    let deposits = sqlx::query_as("SELECT * FROM deposit_requests WHERE status = 'PENDING' ORDER BY id ASC")
        .fetch_all(conn)
        .await?;
    Ok(deposits)
}

pub async fn pending_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<DepositRequest>, LedgerError> {
    let deposits =
        sqlx::query_as("SELECT * FROM deposit_requests WHERE status = 'PENDING' AND user_id = $1 ORDER BY id ASC")
            .bind(user_id)
            .fetch_all(conn)
            .await?;
    Ok(deposits)
}

/// Moves a `PENDING` request into the given terminal state. `Rejected` means the request does not exist or has
/// already been decided.
pub async fn decide(
    id: i64,
    status: DepositStatus,
    decided_by: &str,
    admin_note: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WriteOutcome<DepositRequest>, LedgerError> {
    if !status.is_terminal() {
        return Err(LedgerError::IllegalStatusChange(format!("Deposit #{id} cannot be moved back to {status}")));
    }
    let deposit = sqlx::query_as(
        r#"UPDATE deposit_requests SET status = $1, decided_by = $2, admin_note = $3, decided_at = $4
        WHERE id = $5 AND status = 'PENDING'
        RETURNING *"#,
    )
    .bind(status)
    .bind(decided_by)
    .bind(admin_note)
    .bind(now)
    .bind(id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(WriteOutcome::from_row(deposit))
}

/// Explains why [`decide`] was rejected for `id`.
pub async fn decision_failure(id: i64, conn: &mut SqliteConnection) -> Result<LedgerError, LedgerError> {
    let err = match fetch(id, conn).await? {
        None => LedgerError::DepositNotFound(id),
        Some(d) => LedgerError::DepositAlreadyDecided(id, d.status),
    };
    Ok(err)
}
