use std::fmt::Debug;

use futures_util::future::join_all;
use log::*;
use tokio::sync::RwLock;

use crate::{
    bank_feeds::{BankFeed, BankTransaction},
    db::traits::{
        CreditOutcome,
        CreditTarget,
        DepositDecision,
        DepositManagement,
        LedgerError,
        ReconciliationManagement,
        ReferralManagement,
    },
    db_types::{BankCredit, BankTransfer, DepositStatus, Vnd},
    events::{DepositApprovedEvent, EventProducers},
    helpers::{extract_reference, new_reference_code},
    ledger_api::{
        objects::{FeedReport, PollSummary, ReconciliationSettings, ReferralSettings, TransferOutcome},
        referral_api::ReferralApi,
    },
};

/// A credit is re-matched this many times if the deposit it matched is decided by someone else in the meantime.
const MATCH_ATTEMPTS: usize = 2;

/// `ReconciliationApi` turns bank credits into approved deposits.
///
/// Each poll fetches every configured feed concurrently. A feed that fails is reported and skipped; it never holds up
/// the others. For every credit the memo is searched for a reference, which is matched to a pending deposit request
/// (or, failing that, to a user), and the credit is applied in a single transaction keyed on the provider's
/// transaction id. A credit is therefore applied at most once however many polls see it. Credits that cannot be
/// matched are kept as `UNMATCHED` transfers for an admin to look at, and are retried on later polls.
pub struct ReconciliationApi<B, F> {
    db: B,
    feeds: RwLock<Vec<F>>,
    settings: ReconciliationSettings,
    referrals: ReferralApi<B>,
    producers: EventProducers,
}

impl<B, F> Debug for ReconciliationApi<B, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.settings)
    }
}

impl<B: Clone, F> ReconciliationApi<B, F> {
    pub fn new(db: B, feeds: Vec<F>, settings: ReconciliationSettings, producers: EventProducers) -> Self {
        let referrals = ReferralApi::new(db.clone(), ReferralSettings::default());
        Self { db, feeds: RwLock::new(feeds), settings, referrals, producers }
    }

    pub fn with_referral_settings(mut self, settings: ReferralSettings) -> Self {
        self.referrals = ReferralApi::new(self.db.clone(), settings);
        self
    }

    pub fn settings(&self) -> &ReconciliationSettings {
        &self.settings
    }

    /// Swaps in a new set of feeds. A poll that is already running finishes with the old set.
    pub async fn reload_feeds(&self, feeds: Vec<F>) {
        let mut current = self.feeds.write().await;
        info!("🏦️ Reloading bank feeds. {} -> {} feeds", current.len(), feeds.len());
        *current = feeds;
    }
}

impl<B, F> ReconciliationApi<B, F>
where
    B: ReconciliationManagement + DepositManagement + ReferralManagement,
    F: BankFeed,
{
    pub async fn feed_names(&self) -> Vec<String> {
        self.feeds.read().await.iter().map(|f| f.name().to_string()).collect()
    }

    /// Fetches every feed and applies the credits found.
    pub async fn poll_bank_feeds(&self) -> PollSummary {
        let results = {
            let feeds = self.feeds.read().await;
            let fetches = feeds.iter().map(|feed| async move {
                let result = feed.fetch_transactions().await;
                (feed.name().to_string(), result)
            });
            join_all(fetches).await
        };
        let mut summary = PollSummary::default();
        for (feed, result) in results {
            let report = match result {
                Ok(transactions) => self.process_feed(&feed, transactions).await,
                Err(e) => {
                    let err = LedgerError::ExternalFeedUnavailable { feed: feed.clone(), reason: e.to_string() };
                    warn!("🏦️ {err}");
                    FeedReport { error: Some(err.to_string()), ..FeedReport::new(feed) }
                },
            };
            summary.add_report(report);
        }
        if summary.processed > 0 || summary.failed > 0 {
            info!(
                "🏦️ Poll complete. {} feeds, {} credits applied, {} failures",
                summary.details.len(),
                summary.processed,
                summary.failed
            );
        } else {
            debug!("🏦️ Poll complete. Nothing new across {} feeds", summary.details.len());
        }
        summary
    }

    async fn process_feed(&self, feed: &str, transactions: Vec<BankTransaction>) -> FeedReport {
        let mut report = FeedReport::new(feed);
        report.fetched = transactions.len();
        let credits =
            transactions.into_iter().filter(|tx| tx.is_credit && tx.amount.is_positive()).collect::<Vec<_>>();
        report.credits = credits.len();
        for tx in credits {
            let outcome = self.process_credit(tx.into_credit(feed)).await;
            report.transfers.push(outcome);
        }
        report
    }

    /// Matches a single bank credit and applies it. Errors are reported in the outcome rather than returned, so that
    /// one bad transfer does not stop the rest of the batch.
    pub async fn process_credit(&self, credit: BankCredit) -> TransferOutcome {
        let provider_tx_id = credit.provider_tx_id.clone();
        match self.db.is_transfer_matched(&provider_tx_id).await {
            Ok(true) => {
                trace!("🏦️ Transfer {provider_tx_id} was credited on an earlier poll");
                return TransferOutcome::Duplicate { provider_tx_id };
            },
            Ok(false) => {},
            Err(e) => return failed(provider_tx_id, e),
        }
        for _ in 0..MATCH_ATTEMPTS {
            let target = match self.match_credit(&credit).await {
                Ok(Some(target)) => target,
                Ok(None) => {
                    return match self.db.record_unmatched_transfer(&credit).await {
                        Ok(()) => TransferOutcome::Unmatched { provider_tx_id },
                        Err(e) => failed(provider_tx_id, e),
                    };
                },
                Err(e) => return failed(provider_tx_id, e),
            };
            match self.db.apply_bank_credit(&credit, target).await {
                Ok(CreditOutcome::Credited(decision)) => return self.after_credit(&credit, decision).await,
                Ok(CreditOutcome::Duplicate) => return TransferOutcome::Duplicate { provider_tx_id },
                Ok(CreditOutcome::DepositNotPending(id)) => {
                    debug!("🏦️ Deposit #{id} was decided while matching {provider_tx_id}. Matching again.");
                },
                Err(e) => return failed(provider_tx_id, e),
            }
        }
        TransferOutcome::Failed {
            provider_tx_id,
            reason: "The matching deposit request kept changing. Will retry on the next poll.".into(),
        }
    }

    /// Admin view of credits that could not be matched to a deposit.
    pub async fn unmatched_transfers(&self) -> Result<Vec<BankTransfer>, LedgerError> {
        self.db.unmatched_transfers().await
    }

    async fn match_credit(&self, credit: &BankCredit) -> Result<Option<CreditTarget>, LedgerError> {
        let prefix = self.settings.reference_prefix.as_str();
        let Some(reference) = extract_reference(&credit.reference_text, prefix) else {
            trace!("🏦️ No '{prefix}' reference in memo of {}: '{}'", credit.provider_tx_id, credit.reference_text);
            return Ok(None);
        };
        let code = reference.as_reference_code(prefix);
        if let Some(deposit) = self.db.fetch_deposit_by_reference(&code).await? {
            if deposit.status == DepositStatus::Pending && self.within_tolerance(deposit.amount, credit.amount) {
                trace!("🏦️ Transfer {} matches deposit #{} by code", credit.provider_tx_id, deposit.id);
                return Ok(Some(CreditTarget::Deposit(deposit.id)));
            }
            debug!(
                "🏦️ Transfer {} quotes {code}, but deposit #{} is {} for {} and the transfer is {}",
                credit.provider_tx_id, deposit.id, deposit.status, deposit.amount, credit.amount
            );
        }
        let Some(user_id) = self.db.find_wallet_owner(&reference.token).await? else {
            return Ok(None);
        };
        let pending = self.db.pending_deposits_for_user(&user_id).await?;
        if let Some(deposit) = pending.iter().find(|d| self.within_tolerance(d.amount, credit.amount)) {
            trace!("🏦️ Transfer {} matches pending deposit #{} of {user_id}", credit.provider_tx_id, deposit.id);
            return Ok(Some(CreditTarget::Deposit(deposit.id)));
        }
        if !pending.is_empty() {
            debug!(
                "🏦️ Transfer {} of {} matches none of the {} pending deposit(s) of {user_id}. Leaving it unmatched.",
                credit.provider_tx_id,
                credit.amount,
                pending.len()
            );
            return Ok(None);
        }
        if self.settings.auto_create_deposits {
            debug!("🏦️ {user_id} has no pending deposit for {}. Opening one.", credit.provider_tx_id);
            return Ok(Some(CreditTarget::AutoCreate { user_id, reference_code: new_reference_code(prefix) }));
        }
        Ok(None)
    }

    fn within_tolerance(&self, expected: Vnd, actual: Vnd) -> bool {
        expected
            .checked_sub(actual)
            .and_then(|diff| diff.checked_abs())
            .is_some_and(|diff| diff <= self.settings.amount_tolerance)
    }

    async fn after_credit(&self, credit: &BankCredit, decision: DepositDecision) -> TransferOutcome {
        let DepositDecision { deposit, transaction } = decision;
        info!(
            "🏦️ Bank transfer {} of {} credited to {} (deposit #{})",
            credit.provider_tx_id, credit.amount, deposit.user_id, deposit.id
        );
        if let Some(transaction) = transaction {
            let event = DepositApprovedEvent {
                deposit: deposit.clone(),
                transaction,
                provider_tx_id: Some(credit.provider_tx_id.clone()),
            };
            self.producers.deposit_approved(event).await;
        }
        self.referrals.reward_for_deposit(&deposit, credit.amount).await;
        TransferOutcome::Credited {
            provider_tx_id: credit.provider_tx_id.clone(),
            deposit_id: deposit.id,
            user_id: deposit.user_id,
            amount: credit.amount,
        }
    }
}

fn failed(provider_tx_id: String, e: LedgerError) -> TransferOutcome {
    warn!("🏦️ Could not process bank transfer {provider_tx_id}. {e}");
    TransferOutcome::Failed { provider_tx_id, reason: e.to_string() }
}
