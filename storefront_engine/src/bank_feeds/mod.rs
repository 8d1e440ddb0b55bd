//! Pull-based bank transaction feeds.
//!
//! A feed knows how to fetch the recent transactions of one bank account and to tell credits from debits. The
//! reconciliation API polls every configured feed on an interval and decides what to do with the credits.
mod config;
mod errors;
mod http_feed;

use chrono::{DateTime, Utc};
pub use config::{load_feed_configs, BankFeedConfig, CreditFilter, FeedMethod, FieldMapping};
pub use errors::BankFeedError;
pub use http_feed::HttpBankFeed;
use serde::{Deserialize, Serialize};

use crate::db_types::{BankCredit, Vnd};

/// One transaction as reported by a bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransaction {
    /// The bank's own id for the transaction. Used to make sure a credit is applied exactly once.
    pub provider_tx_id: String,
    pub amount: Vnd,
    pub is_credit: bool,
    /// The free-text memo the sender typed, where the deposit reference is expected.
    pub reference_text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl BankTransaction {
    pub fn into_credit(self, bank: &str) -> BankCredit {
        BankCredit {
            bank: bank.to_string(),
            provider_tx_id: self.provider_tx_id,
            amount: self.amount,
            reference_text: self.reference_text,
            transferred_at: self.timestamp,
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait BankFeed {
    /// A short, stable name for the bank account behind this feed.
    fn name(&self) -> &str;

    /// Fetches recent transactions. Credits and debits are both returned; debits have `is_credit == false`.
    async fn fetch_transactions(&self) -> Result<Vec<BankTransaction>, BankFeedError>;
}
