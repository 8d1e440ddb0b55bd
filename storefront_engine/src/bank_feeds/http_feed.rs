use std::{str::FromStr, sync::Arc, time::Duration};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
    Method,
};
use serde_json::Value;

use super::{BankFeed, BankFeedConfig, BankFeedError, BankTransaction, CreditFilter, FeedMethod};
use crate::db_types::Vnd;

/// Bank statements without an explicit offset are in Vietnam local time.
const LOCAL_OFFSET_SECS: i32 = 7 * 3600;
const LOCAL_TIME_FORMATS: [&str; 4] =
    ["%d/%m/%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d-%m-%Y %H:%M:%S"];

/// A [`BankFeed`] backed by a JSON-over-HTTP endpoint, driven entirely by a [`BankFeedConfig`].
#[derive(Clone)]
pub struct HttpBankFeed {
    config: BankFeedConfig,
    client: Arc<Client>,
}

impl std::fmt::Debug for HttpBankFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HttpBankFeed({} @ {})", self.config.name, self.config.url)
    }
}

impl HttpBankFeed {
    pub fn new(config: BankFeedConfig) -> Result<Self, BankFeedError> {
        let mut headers = HeaderMap::with_capacity(config.headers.len() + 2);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        for (k, v) in &config.headers {
            let name = HeaderName::from_str(k).map_err(|e| BankFeedError::Initialization(e.to_string()))?;
            let val = HeaderValue::from_str(v).map_err(|e| BankFeedError::Initialization(e.to_string()))?;
            headers.insert(name, val);
        }
        if let Some(token) = &config.bearer_token {
            let mut val = HeaderValue::from_str(&format!("Bearer {}", token.reveal()))
                .map_err(|e| BankFeedError::Initialization(e.to_string()))?;
            val.set_sensitive(true);
            headers.insert("Authorization", val);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BankFeedError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &BankFeedConfig {
        &self.config
    }

    async fn fetch_json(&self) -> Result<Value, BankFeedError> {
        let method = match self.config.method {
            FeedMethod::Get => Method::GET,
            FeedMethod::Post => Method::POST,
        };
        trace!("🏦️ Querying {} ({method} {})", self.config.name, self.config.url);
        let mut req = self.client.request(method, &self.config.url);
        if let Some(body) = &self.config.body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(|e| BankFeedError::RequestError(e.to_string()))?;
        if response.status().is_success() {
            response.json::<Value>().await.map_err(|e| BankFeedError::InvalidResponse(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| BankFeedError::RequestError(e.to_string()))?;
            Err(BankFeedError::QueryError { status, message })
        }
    }

    /// Maps one raw transaction object onto a [`BankTransaction`]. Returns `None` (and logs) if a required field is
    /// missing or unreadable.
    fn parse_transaction(&self, raw: &Value) -> Option<BankTransaction> {
        let fields = &self.config.fields;
        let name = &self.config.name;
        let provider_tx_id = match lookup(raw, &fields.id) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                warn!("🏦️ [{name}] Skipping transaction without an id: {raw}");
                return None;
            },
        };
        let Some(amount) = lookup(raw, &fields.amount).and_then(parse_amount) else {
            warn!("🏦️ [{name}] Skipping transaction {provider_tx_id}. Amount is missing or invalid");
            return None;
        };
        let Some(magnitude) = amount.checked_abs() else {
            warn!("🏦️ [{name}] Skipping transaction {provider_tx_id}. Amount {} is out of range", amount.value());
            return None;
        };
        let reference_text = match lookup(raw, &fields.description) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::default(),
            Some(v) => v.to_string(),
        };
        let timestamp = fields.timestamp.as_ref().and_then(|path| lookup(raw, path)).and_then(parse_timestamp);
        let is_credit = is_credit(&self.config.credit_filter, raw, amount);
        Some(BankTransaction { provider_tx_id, amount: magnitude, is_credit, reference_text, timestamp })
    }
}

impl BankFeed for HttpBankFeed {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn fetch_transactions(&self) -> Result<Vec<BankTransaction>, BankFeedError> {
        let json = self.fetch_json().await?;
        let list = lookup(&json, &self.config.transactions_path).and_then(Value::as_array).ok_or_else(|| {
            BankFeedError::InvalidResponse(format!(
                "Expected a transaction list at '{}' in the response",
                self.config.transactions_path
            ))
        })?;
        let transactions = list.iter().filter_map(|raw| self.parse_transaction(raw)).collect::<Vec<_>>();
        debug!(
            "🏦️ [{}] Fetched {} transactions ({} in response)",
            self.config.name,
            transactions.len(),
            list.len()
        );
        Ok(transactions)
    }
}

/// Follows a dotted path (`data.items`) into a JSON value. An empty path returns the value itself.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |v, key| match v {
        Value::Object(map) => map.get(key),
        Value::Array(arr) => key.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    })
}

fn parse_amount(value: &Value) -> Option<Vnd> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)).map(Vnd::from),
        Value::String(s) => Vnd::from_str(s).ok(),
        _ => None,
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let offset = FixedOffset::east_opt(LOCAL_OFFSET_SECS)?;
    LOCAL_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|dt| dt.with_timezone(&Utc))
}

fn is_credit(filter: &CreditFilter, raw: &Value, amount: Vnd) -> bool {
    match filter {
        CreditFilter::PositiveAmount => amount.is_positive(),
        CreditFilter::FieldEquals { field, value } => match (lookup(raw, field), value) {
            (Some(Value::String(actual)), Value::String(expected)) => actual.eq_ignore_ascii_case(expected),
            (Some(actual), expected) => actual == expected,
            (None, _) => false,
        },
        CreditFilter::NonZeroField { field } => {
            lookup(raw, field).and_then(parse_amount).map(|v| v.value() != 0).unwrap_or(false)
        },
        CreditFilter::All => true,
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::bank_feeds::FieldMapping;

    fn config(url: &str, path: &str, filter: CreditFilter) -> BankFeedConfig {
        BankFeedConfig {
            name: "testbank".into(),
            enabled: true,
            url: url.into(),
            method: FeedMethod::Get,
            headers: Default::default(),
            bearer_token: Some(storefront_common::Secret::new("sekrit".to_string())),
            body: None,
            transactions_path: path.into(),
            fields: FieldMapping {
                id: "id".into(),
                amount: "amount".into(),
                description: "memo".into(),
                timestamp: Some("when".into()),
            },
            credit_filter: filter,
            timeout_secs: 5,
        }
    }

    #[test]
    fn dotted_lookup() {
        let v = json!({"data": {"records": [{"id": 1}, {"id": 2}]}});
        assert_eq!(lookup(&v, "data.records.1.id"), Some(&json!(2)));
        assert_eq!(lookup(&v, "data.nope"), None);
        assert_eq!(lookup(&v, ""), Some(&v));
    }

    #[test]
    fn amounts_and_timestamps() {
        assert_eq!(parse_amount(&json!(50000)), Some(Vnd::from(50_000)));
        assert_eq!(parse_amount(&json!(50000.0)), Some(Vnd::from(50_000)));
        assert_eq!(parse_amount(&json!("-1,250,000")), Some(Vnd::from(-1_250_000)));
        assert_eq!(parse_amount(&json!("n/a")), None);
        let utc = parse_timestamp(&json!("2026-10-01T03:00:00Z")).unwrap();
        let local = parse_timestamp(&json!("01/10/2026 10:00:00")).unwrap();
        assert_eq!(utc, local);
        assert!(parse_timestamp(&json!("yesterday")).is_none());
    }

    #[test]
    fn out_of_range_amounts_are_skipped() {
        let feed = HttpBankFeed::new(config("http://localhost", "", CreditFilter::All)).unwrap();
        let tx = feed.parse_transaction(&json!({"id": "A1", "amount": -75_000, "memo": "DEP-bob"})).unwrap();
        assert_eq!(tx.amount, Vnd::from(75_000));
        assert!(feed.parse_transaction(&json!({"id": "A2", "amount": i64::MIN, "memo": "DEP-bob"})).is_none());
        assert!(feed.parse_transaction(&json!({"id": "A3", "amount": -1e30, "memo": "DEP-bob"})).is_none());
    }

    #[test]
    fn credit_filters() {
        let raw = json!({"type": "in", "creditAmount": 0});
        assert!(is_credit(&CreditFilter::PositiveAmount, &raw, Vnd::from(5)));
        assert!(!is_credit(&CreditFilter::PositiveAmount, &raw, Vnd::from(-5)));
        let f = CreditFilter::FieldEquals { field: "type".into(), value: json!("IN") };
        assert!(is_credit(&f, &raw, Vnd::from(5)));
        let f = CreditFilter::NonZeroField { field: "creditAmount".into() };
        assert!(!is_credit(&f, &raw, Vnd::from(5)));
        assert!(is_credit(&CreditFilter::All, &raw, Vnd::from(-5)));
    }

    #[tokio::test]
    async fn fetch_from_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/history")
            .match_header("authorization", "Bearer sekrit")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"data": [
                    {"id": "TX1", "amount": 50000, "memo": "DEP-ABCD2345 thanks", "when": "2026-10-01T03:00:00Z"},
                    {"id": "TX2", "amount": -20000, "memo": "ATM"},
                    {"amount": 1000, "memo": "no id"},
                    {"id": 77, "amount": "100,000", "memo": null}
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        let feed = HttpBankFeed::new(config(&format!("{}/history", server.url()), "data", CreditFilter::default()))
            .unwrap();
        let txs = feed.fetch_transactions().await.unwrap();
        mock.assert_async().await;
        assert_eq!(txs.len(), 3);
        assert_eq!(txs[0].provider_tx_id, "TX1");
        assert_eq!(txs[0].amount, Vnd::from(50_000));
        assert!(txs[0].is_credit);
        assert!(txs[0].timestamp.is_some());
        assert_eq!(txs[1].amount, Vnd::from(20_000));
        assert!(!txs[1].is_credit);
        assert_eq!(txs[2].provider_tx_id, "77");
        assert_eq!(txs[2].reference_text, "");
    }

    #[tokio::test]
    async fn server_errors_are_reported() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/history").with_status(503).with_body("maintenance").create_async().await;
        let feed = HttpBankFeed::new(config(&format!("{}/history", server.url()), "", CreditFilter::All)).unwrap();
        let err = feed.fetch_transactions().await.unwrap_err();
        match err {
            BankFeedError::QueryError { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            },
            e => panic!("Unexpected error {e}"),
        }
    }

    #[tokio::test]
    async fn unexpected_shape() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/history").with_status(200).with_body(r#"{"data": {}}"#).create_async().await;
        let feed = HttpBankFeed::new(config(&format!("{}/history", server.url()), "data", CreditFilter::All)).unwrap();
        let err = feed.fetch_transactions().await.unwrap_err();
        assert!(matches!(err, BankFeedError::InvalidResponse(_)));
    }
}
