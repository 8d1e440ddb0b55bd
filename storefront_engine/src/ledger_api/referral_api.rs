use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{LedgerError, ReferralManagement, WalletUpdate},
    db_types::{DepositRequest, Referral, Vnd},
    ledger_api::objects::ReferralSettings,
};

/// Referral bookkeeping and the reward cascade that follows an approved deposit.
pub struct ReferralApi<B> {
    db: B,
    settings: ReferralSettings,
}

impl<B> Debug for ReferralApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReferralApi ({:?})", self.settings)
    }
}

impl<B: Clone> Clone for ReferralApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), settings: self.settings.clone() }
    }
}

impl<B> ReferralApi<B> {
    pub fn new(db: B, settings: ReferralSettings) -> Self {
        Self { db, settings }
    }

    pub fn settings(&self) -> &ReferralSettings {
        &self.settings
    }
}

impl<B> ReferralApi<B>
where B: ReferralManagement
{
    pub async fn register_referral(&self, referrer_id: &str, referee_id: &str) -> Result<Referral, LedgerError> {
        let (referrer_id, referee_id) = (referrer_id.trim(), referee_id.trim());
        if referrer_id.is_empty() || referee_id.is_empty() {
            return Err(LedgerError::ReferralError("Both the referrer and the referee are required".into()));
        }
        if referrer_id.eq_ignore_ascii_case(referee_id) {
            return Err(LedgerError::ReferralError(format!("{referee_id} cannot refer themselves")));
        }
        let referral = self.db.register_referral(referrer_id, referee_id).await?;
        debug!("💰️ {referrer_id} referred {referee_id}");
        Ok(referral)
    }

    pub async fn referrer_of(&self, referee_id: &str) -> Result<Option<Referral>, LedgerError> {
        self.db.fetch_referral(referee_id).await
    }

    pub async fn referrals_by(&self, referrer_id: &str) -> Result<Vec<Referral>, LedgerError> {
        self.db.referrals_by(referrer_id).await
    }

    /// Pays the depositor's referrer their cut of an approved deposit.
    ///
    /// This runs after the deposit has committed and never fails: any problem is logged and `None` is returned.
    pub async fn reward_for_deposit(&self, deposit: &DepositRequest, amount: Vnd) -> Option<WalletUpdate> {
        if !self.settings.enabled {
            return None;
        }
        let referral = match self.db.fetch_referral(&deposit.user_id).await {
            Ok(Some(r)) => r,
            Ok(None) => return None,
            Err(e) => {
                warn!("💰️ Could not look up the referrer of {}. No reward will be paid. {e}", deposit.user_id);
                return None;
            },
        };
        let reward = self.settings.reward_for(amount);
        if !reward.is_positive() {
            trace!("💰️ Deposit #{} of {amount} earns no referral reward", deposit.id);
            return None;
        }
        match self.db.credit_referral_reward(&referral, reward, Some(deposit.id)).await {
            Ok(update) => {
                info!(
                    "💰️ {} earned a referral reward of {reward} for deposit #{} by {}",
                    referral.referrer_id, deposit.id, referral.referee_id
                );
                Some(update)
            },
            Err(e) => {
                warn!(
                    "💰️ Referral reward of {reward} to {} for deposit #{} failed. {e}",
                    referral.referrer_id, deposit.id
                );
                None
            },
        }
    }
}
