use crate::{
    db::traits::{LedgerError, WalletUpdate},
    db_types::{Referral, Vnd},
};

#[allow(async_fn_in_trait)]
pub trait ReferralManagement: Clone {
    /// Links `referee_id` to `referrer_id`. A user can only ever have one referrer and cannot refer themselves.
    async fn register_referral(&self, referrer_id: &str, referee_id: &str) -> Result<Referral, LedgerError>;

    async fn fetch_referral(&self, referee_id: &str) -> Result<Option<Referral>, LedgerError>;

    async fn referrals_by(&self, referrer_id: &str) -> Result<Vec<Referral>, LedgerError>;

    /// Credits the referrer of `referee_id` with `reward` and appends a `REFERRAL_REWARD` ledger entry.
    async fn credit_referral_reward(
        &self,
        referral: &Referral,
        reward: Vnd,
        deposit_id: Option<i64>,
    ) -> Result<WalletUpdate, LedgerError>;
}
