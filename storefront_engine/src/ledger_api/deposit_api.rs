use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{DepositDecision, DepositManagement, LedgerError, ReferralManagement},
    db_types::{DepositRequest, NewDepositRequest, Vnd},
    events::{DepositApprovedEvent, DepositRejectedEvent, EventProducers},
    helpers::new_reference_code,
    ledger_api::{
        objects::{ReferralSettings, DEFAULT_REFERENCE_PREFIX},
        referral_api::ReferralApi,
    },
};

/// How many fresh reference codes to try before giving up on a collision.
const REFERENCE_CODE_ATTEMPTS: usize = 3;

/// `DepositApi` drives the deposit request state machine: `PENDING -> APPROVED | REJECTED`, nothing else.
pub struct DepositApi<B> {
    db: B,
    producers: EventProducers,
    reference_prefix: String,
    referrals: ReferralApi<B>,
}

impl<B> Debug for DepositApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DepositApi ({})", self.reference_prefix)
    }
}

impl<B: Clone> DepositApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        let referrals = ReferralApi::new(db.clone(), ReferralSettings::default());
        Self { db, producers, reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(), referrals }
    }

    pub fn with_reference_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.reference_prefix = prefix.into();
        self
    }

    pub fn with_referral_settings(mut self, settings: ReferralSettings) -> Self {
        self.referrals = ReferralApi::new(self.db.clone(), settings);
        self
    }
}

impl<B> DepositApi<B>
where B: DepositManagement + ReferralManagement
{
    /// Opens a pending deposit request and gives it a reference code for the user to quote in their transfer memo.
    pub async fn create_deposit_request(
        &self,
        user_id: &str,
        amount: Vnd,
        note: Option<String>,
    ) -> Result<DepositRequest, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!("Deposits must be positive, got {amount}")));
        }
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = NewDepositRequest {
                user_id: user_id.to_string(),
                amount,
                reference_code: new_reference_code(&self.reference_prefix),
                note: note.clone(),
            };
            match self.db.insert_deposit_request(request).await {
                Ok(deposit) => return Ok(deposit),
                Err(LedgerError::ValidationError(msg)) if attempt < REFERENCE_CODE_ATTEMPTS => {
                    warn!("💰️ Reference code collision ({msg}). Trying a new code.");
                },
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn fetch_deposit(&self, id: i64) -> Result<DepositRequest, LedgerError> {
        self.db.fetch_deposit(id).await?.ok_or(LedgerError::DepositNotFound(id))
    }

    pub async fn pending_deposits(&self) -> Result<Vec<DepositRequest>, LedgerError> {
        self.db.pending_deposits().await
    }

    pub async fn pending_deposits_for_user(&self, user_id: &str) -> Result<Vec<DepositRequest>, LedgerError> {
        self.db.pending_deposits_for_user(user_id).await
    }

    /// Approves a pending request and credits the wallet. Approving twice fails with
    /// [`LedgerError::DepositAlreadyDecided`] and credits nothing.
    pub async fn approve_deposit(&self, id: i64, admin_id: &str, note: &str) -> Result<DepositRequest, LedgerError> {
        let DepositDecision { deposit, transaction } = self.db.approve_deposit(id, admin_id, note).await?;
        info!("💰️ Deposit #{id} of {} for {} approved by {admin_id}", deposit.amount, deposit.user_id);
        if let Some(transaction) = transaction {
            let event = DepositApprovedEvent { deposit: deposit.clone(), transaction, provider_tx_id: None };
            self.producers.deposit_approved(event).await;
        }
        self.referrals.reward_for_deposit(&deposit, deposit.amount).await;
        Ok(deposit)
    }

    pub async fn reject_deposit(&self, id: i64, admin_id: &str, note: &str) -> Result<DepositRequest, LedgerError> {
        let DepositDecision { deposit, .. } = self.db.reject_deposit(id, admin_id, note).await?;
        info!("💰️ Deposit #{id} for {} rejected by {admin_id}: {note}", deposit.user_id);
        self.producers.deposit_rejected(DepositRejectedEvent { deposit: deposit.clone() }).await;
        Ok(deposit)
    }
}
