use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{AdjustmentDirection, LedgerAudit, LedgerError, WalletManagement, WalletUpdate},
    db_types::{Vnd, Wallet, WalletTransaction},
    events::{EventProducers, WalletAdjustedEvent},
};

/// `WalletApi` exposes the balance store and its ledger: wallet creation, manual adjustments and the audit trail.
pub struct WalletApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> WalletApi<B>
where B: WalletManagement
{
    /// Opens a wallet with a zero balance. Every user gets exactly one.
    pub async fn create_wallet(&self, user_id: &str) -> Result<Wallet, LedgerError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(LedgerError::ValidationError("User id cannot be empty".into()));
        }
        self.db.create_wallet(user_id).await
    }

    pub async fn fetch_wallet(&self, user_id: &str) -> Result<Wallet, LedgerError> {
        self.db.fetch_wallet(user_id).await?.ok_or_else(|| LedgerError::WalletNotFound(user_id.to_string()))
    }

    /// Manually credits or debits a wallet. A debit that would take the balance below zero fails with
    /// [`LedgerError::InsufficientFunds`] and changes nothing.
    pub async fn adjust_wallet(
        &self,
        user_id: &str,
        amount: Vnd,
        direction: AdjustmentDirection,
        reason: &str,
        admin_id: &str,
    ) -> Result<Wallet, LedgerError> {
        if reason.trim().is_empty() {
            return Err(LedgerError::ValidationError("A reason is required for wallet adjustments".into()));
        }
        let WalletUpdate { wallet, transaction } =
            self.db.adjust_wallet(user_id, amount, direction, reason, admin_id).await?;
        info!("💰️ {admin_id} adjusted {user_id}'s wallet: {direction} of {amount} ({reason})");
        self.producers.wallet_adjusted(WalletAdjustedEvent { wallet: wallet.clone(), transaction }).await;
        Ok(wallet)
    }

    pub async fn wallet_history(&self, user_id: &str) -> Result<Vec<WalletTransaction>, LedgerError> {
        self.db.wallet_history(user_id).await
    }

    /// Replays the user's ledger from zero and compares every `balance_after` snapshot, and the final sum, against the
    /// wallet.
    pub async fn audit_ledger(&self, user_id: &str) -> Result<LedgerAudit, LedgerError> {
        let wallet = self.fetch_wallet(user_id).await?;
        let entries = self.db.wallet_history(user_id).await?;
        let mut running = Vnd::default();
        let mut inconsistent_entries = Vec::new();
        for entry in &entries {
            running += entry.signed_delta();
            if entry.balance_after != running {
                inconsistent_entries.push(entry.id);
            }
        }
        let audit = LedgerAudit {
            user_id: user_id.to_string(),
            entries: entries.len(),
            replayed_balance: running,
            wallet_balance: wallet.balance,
            inconsistent_entries,
        };
        if audit.is_consistent() {
            debug!("💰️ Ledger for {user_id} is consistent over {} entries", audit.entries);
        } else {
            error!(
                "💰️ Ledger for {user_id} does not replay. Replayed {} vs wallet {}. Bad entries: {:?}",
                audit.replayed_balance, audit.wallet_balance, audit.inconsistent_entries
            );
        }
        Ok(audit)
    }
}
