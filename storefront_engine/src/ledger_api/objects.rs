use serde::{Deserialize, Serialize};

use crate::db_types::Vnd;

pub const DEFAULT_REFERENCE_PREFIX: &str = "DEP";

/// A line of a cart, before it has been priced from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationSettings {
    /// A bank credit matches a pending deposit if the amounts differ by at most this much.
    pub amount_tolerance: Vnd,
    pub reference_prefix: String,
    /// Open and approve a deposit on the fly when the memo names a known user but no pending request matches.
    pub auto_create_deposits: bool,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            amount_tolerance: Vnd::default(),
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
            auto_create_deposits: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralSettings {
    pub enabled: bool,
    pub percent: i64,
    pub max_reward: Vnd,
}

impl Default for ReferralSettings {
    fn default() -> Self {
        Self { enabled: true, percent: 5, max_reward: Vnd::from(250_000) }
    }
}

impl ReferralSettings {
    pub fn disabled() -> Self {
        Self { enabled: false, ..Default::default() }
    }

    /// `min(floor(amount * percent / 100), max_reward)`. A non-positive cap means no cap.
    pub fn reward_for(&self, amount: Vnd) -> Vnd {
        let reward = amount.percent(self.percent).max(Vnd::default());
        if self.max_reward.is_positive() {
            reward.min(self.max_reward)
        } else {
            reward
        }
    }
}

/// What happened to a single bank credit during a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransferOutcome {
    Credited { provider_tx_id: String, deposit_id: i64, user_id: String, amount: Vnd },
    Duplicate { provider_tx_id: String },
    Unmatched { provider_tx_id: String },
    Failed { provider_tx_id: String, reason: String },
}

/// Per-feed results of a poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedReport {
    pub feed: String,
    pub fetched: usize,
    pub credits: usize,
    /// Set when the feed could not be fetched at all.
    pub error: Option<String>,
    pub transfers: Vec<TransferOutcome>,
}

impl FeedReport {
    pub fn new<S: Into<String>>(feed: S) -> Self {
        Self { feed: feed.into(), ..Default::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    /// Credits applied to a wallet in this poll
    pub processed: usize,
    /// Transfers that errored, plus feeds that could not be fetched
    pub failed: usize,
    pub details: Vec<FeedReport>,
}

impl PollSummary {
    pub(crate) fn add_report(&mut self, report: FeedReport) {
        for t in &report.transfers {
            match t {
                TransferOutcome::Credited { .. } => self.processed += 1,
                TransferOutcome::Failed { .. } => self.failed += 1,
                _ => {},
            }
        }
        if report.error.is_some() {
            self.failed += 1;
        }
        self.details.push(report);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn referral_reward() {
        let settings = ReferralSettings::default();
        assert_eq!(settings.reward_for(Vnd::from(100_000)), Vnd::from(5_000));
        assert_eq!(settings.reward_for(Vnd::from(19)), Vnd::from(0));
        assert_eq!(settings.reward_for(Vnd::from(10_000_000)), Vnd::from(250_000));
        let uncapped = ReferralSettings { max_reward: Vnd::from(0), ..Default::default() };
        assert_eq!(uncapped.reward_for(Vnd::from(10_000_000)), Vnd::from(500_000));
    }

    #[test]
    fn poll_summary_tally() {
        let mut summary = PollSummary::default();
        let mut ok = FeedReport::new("a");
        ok.transfers = vec![
            TransferOutcome::Credited {
                provider_tx_id: "1".into(),
                deposit_id: 1,
                user_id: "u".into(),
                amount: Vnd::from(5),
            },
            TransferOutcome::Duplicate { provider_tx_id: "2".into() },
            TransferOutcome::Failed { provider_tx_id: "3".into(), reason: "db".into() },
        ];
        let mut down = FeedReport::new("b");
        down.error = Some("timeout".into());
        summary.add_report(ok);
        summary.add_report(down);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.details.len(), 2);
    }
}
