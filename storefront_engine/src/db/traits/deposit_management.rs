use crate::{
    db::traits::{DepositDecision, LedgerError},
    db_types::{DepositRequest, NewDepositRequest},
};

/// Behaviour for the deposit request state machine: `PENDING → APPROVED | REJECTED`, with no way back out of a
/// terminal state.
#[allow(async_fn_in_trait)]
pub trait DepositManagement: Clone {
    async fn insert_deposit_request(&self, request: NewDepositRequest) -> Result<DepositRequest, LedgerError>;

    async fn fetch_deposit(&self, id: i64) -> Result<Option<DepositRequest>, LedgerError>;

    async fn fetch_deposit_by_reference(&self, reference_code: &str) -> Result<Option<DepositRequest>, LedgerError>;

    async fn pending_deposits(&self) -> Result<Vec<DepositRequest>, LedgerError>;

    async fn pending_deposits_for_user(&self, user_id: &str) -> Result<Vec<DepositRequest>, LedgerError>;

    /// Moves the request from `PENDING` to `APPROVED`, credits the wallet and appends a `DEPOSIT` ledger entry, all in
    /// one transaction.
    async fn approve_deposit(&self, id: i64, admin_id: &str, note: &str) -> Result<DepositDecision, LedgerError>;

    /// Moves the request from `PENDING` to `REJECTED`. No money moves.
    async fn reject_deposit(&self, id: i64, admin_id: &str, note: &str) -> Result<DepositDecision, LedgerError>;
}
