use crate::{
    db::traits::{AdjustmentDirection, LedgerError, WalletUpdate},
    db_types::{Vnd, Wallet, WalletTransaction},
};

/// The balance store and its append-only ledger.
///
/// Every balance change goes through a single conditional write and is documented by a ledger entry written in the
/// same transaction. Debits only succeed when the balance can cover them; the caller learns this from the outcome of
/// the write, never from a value read beforehand.
#[allow(async_fn_in_trait)]
pub trait WalletManagement: Clone {
    /// Creates an empty wallet for the user. Fails with [`LedgerError::WalletAlreadyExists`] if there is one already.
    async fn create_wallet(&self, user_id: &str) -> Result<Wallet, LedgerError>;

    async fn fetch_wallet(&self, user_id: &str) -> Result<Option<Wallet>, LedgerError>;

    /// Applies a manual adjustment of `amount` in the given direction and appends an `ADMIN_ADJUST` entry whose amount
    /// carries the sign of the adjustment.
    async fn adjust_wallet(
        &self,
        user_id: &str,
        amount: Vnd,
        direction: AdjustmentDirection,
        reason: &str,
        admin_id: &str,
    ) -> Result<WalletUpdate, LedgerError>;

    /// All ledger entries for the user, in commit order.
    async fn wallet_history(&self, user_id: &str) -> Result<Vec<WalletTransaction>, LedgerError>;
}
