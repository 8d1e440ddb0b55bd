use crate::{
    db::traits::{CreditOutcome, CreditTarget, LedgerError},
    db_types::{BankCredit, BankTransfer},
};

/// Storage side of bank reconciliation.
#[allow(async_fn_in_trait)]
pub trait ReconciliationManagement: Clone {
    /// Returns true if a credit with this provider transaction id has already been applied to a wallet.
    async fn is_transfer_matched(&self, provider_tx_id: &str) -> Result<bool, LedgerError>;

    /// Applies a bank credit in a single transaction:
    /// * records the provider transaction id as matched. If it already is, nothing else happens and
    ///   [`CreditOutcome::Duplicate`] is returned.
    /// * approves the target deposit request (or opens an approved one for [`CreditTarget::AutoCreate`])
    /// * credits the wallet and appends a `DEPOSIT` ledger entry tagged with the provider transaction id.
    async fn apply_bank_credit(&self, credit: &BankCredit, target: CreditTarget) -> Result<CreditOutcome, LedgerError>;

    /// Records a credit that could not be matched to any deposit request. Re-recording the same provider id is a no-op.
    async fn record_unmatched_transfer(&self, credit: &BankCredit) -> Result<(), LedgerError>;

    async fn unmatched_transfers(&self) -> Result<Vec<BankTransfer>, LedgerError>;

    async fn fetch_transfer(&self, provider_tx_id: &str) -> Result<Option<BankTransfer>, LedgerError>;

    /// Looks up the user id whose wallet matches `candidate`, ignoring case.
    async fn find_wallet_owner(&self, candidate: &str) -> Result<Option<String>, LedgerError>;
}
