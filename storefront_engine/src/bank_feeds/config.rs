use std::{collections::HashMap, path::Path};

use log::*;
use serde::Deserialize;
use serde_json::Value;
use storefront_common::Secret;

use super::BankFeedError;

/// How to reach one bank account's transaction endpoint, and how to read the response.
///
/// Bank APIs all disagree on field names, so the mapping from the response JSON onto a [`super::BankTransaction`]
/// is part of the configuration rather than code.
#[derive(Debug, Clone, Deserialize)]
pub struct BankFeedConfig {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub url: String,
    #[serde(default)]
    pub method: FeedMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub bearer_token: Option<Secret<String>>,
    /// JSON body to send with POST requests.
    #[serde(default)]
    pub body: Option<Value>,
    /// Dotted path to the transaction array in the response, e.g. `data.records`. Empty means the response itself is
    /// the array.
    #[serde(default)]
    pub transactions_path: String,
    pub fields: FieldMapping,
    #[serde(default)]
    pub credit_filter: CreditFilter,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedMethod {
    #[default]
    Get,
    Post,
}

/// Dotted paths, relative to each transaction object, of the fields we need.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldMapping {
    pub id: String,
    pub amount: String,
    pub description: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Decides whether a transaction is money coming in.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CreditFilter {
    /// Positive amounts are credits, negative amounts are debits.
    #[default]
    PositiveAmount,
    /// Credits carry a marker field, e.g. `{"type": "field_equals", "field": "type", "value": "IN"}`.
    FieldEquals { field: String, value: Value },
    /// Credits have a non-zero value in a dedicated field, e.g. `creditAmount`.
    NonZeroField { field: String },
    /// The endpoint only ever returns credits.
    All,
}

/// Loads the list of bank feeds from a JSON file. Disabled feeds are dropped.
pub fn load_feed_configs<P: AsRef<Path>>(path: P) -> Result<Vec<BankFeedConfig>, BankFeedError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| BankFeedError::Configuration(format!("Could not read {}. {e}", path.display())))?;
    let configs: Vec<BankFeedConfig> = serde_json::from_str(&contents)
        .map_err(|e| BankFeedError::Configuration(format!("{} is not a valid feed list. {e}", path.display())))?;
    let (enabled, disabled): (Vec<_>, Vec<_>) = configs.into_iter().partition(|c| c.enabled);
    for c in &disabled {
        info!("🏦️ Bank feed '{}' is disabled and will not be polled", c.name);
    }
    debug!("🏦️ Loaded {} bank feed configurations from {}", enabled.len(), path.display());
    Ok(enabled)
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    const FEEDS: &str = r#"[
        {
            "name": "acb",
            "url": "https://bank.example/api/transactions",
            "bearer_token": "abc123",
            "transactions_path": "data",
            "fields": { "id": "transactionId", "amount": "amount", "description": "description" },
            "credit_filter": { "type": "field_equals", "field": "type", "value": "IN" }
        },
        {
            "name": "vcb",
            "enabled": false,
            "url": "https://other.example/history",
            "method": "POST",
            "body": { "account": "0123" },
            "fields": { "id": "ref", "amount": "creditAmount", "description": "memo", "timestamp": "postedAt" },
            "credit_filter": { "type": "non_zero_field", "field": "creditAmount" }
        }
    ]"#;

    #[test]
    fn parse_feed_list() {
        let configs: Vec<BankFeedConfig> = serde_json::from_str(FEEDS).unwrap();
        assert_eq!(configs.len(), 2);
        let acb = &configs[0];
        assert!(acb.enabled);
        assert_eq!(acb.method, FeedMethod::Get);
        assert_eq!(acb.timeout_secs, 30);
        assert_eq!(acb.bearer_token.as_ref().unwrap().reveal(), "abc123");
        assert_eq!(acb.credit_filter, CreditFilter::FieldEquals { field: "type".into(), value: Value::from("IN") });
        let vcb = &configs[1];
        assert!(!vcb.enabled);
        assert_eq!(vcb.method, FeedMethod::Post);
        assert_eq!(vcb.fields.timestamp.as_deref(), Some("postedAt"));
    }

    #[test]
    fn load_skips_disabled_feeds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FEEDS.as_bytes()).unwrap();
        let configs = load_feed_configs(file.path()).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "acb");
    }

    #[test]
    fn load_bad_file() {
        let err = load_feed_configs("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, BankFeedError::Configuration(_)));
    }
}
