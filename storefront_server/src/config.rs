use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use storefront_common::helpers::parse_boolean_flag;
use storefront_engine::{
    db_types::Vnd,
    objects::{ReconciliationSettings, ReferralSettings, DEFAULT_REFERENCE_PREFIX},
};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_UNPAID_ORDER_TIMEOUT: Duration = Duration::hours(24);
const DEFAULT_REFERRAL_PERCENT: i64 = 5;
const DEFAULT_REFERRAL_MAX_REWARD: i64 = 250_000;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// JSON file holding the list of bank feeds to poll. With no file, the reconciliation worker idles.
    pub bank_feeds_file: Option<PathBuf>,
    /// Time between two bank feed polls.
    pub poll_interval: StdDuration,
    /// The time before an unpaid order is considered abandoned and marked as expired.
    pub unpaid_order_timeout: Duration,
    pub reconciliation: ReconciliationSettings,
    pub referrals: ReferralSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            bank_feeds_file: None,
            poll_interval: StdDuration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            unpaid_order_timeout: DEFAULT_UNPAID_ORDER_TIMEOUT,
            reconciliation: ReconciliationSettings::default(),
            referrals: ReferralSettings::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        Self::from_source(|name| env::var(name).ok())
    }

    /// Builds the configuration from any key-value source. Missing values take their defaults; invalid ones are
    /// logged and replaced by their defaults.
    pub fn from_source<F>(get: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let database_url = get("SFL_DATABASE_URL").unwrap_or_else(|| {
            info!("🪛️ SFL_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = parse_or_default(&get, "SFL_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS, |n| *n > 0);
        let bank_feeds_file = get("SFL_BANK_FEEDS_FILE").filter(|s| !s.trim().is_empty()).map(PathBuf::from);
        if bank_feeds_file.is_none() {
            warn!("🪛️ SFL_BANK_FEEDS_FILE is not set. No bank feeds will be polled.");
        }
        let poll_secs = parse_or_default(&get, "SFL_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS, |n| *n > 0);
        let timeout_hrs =
            parse_or_default(&get, "SFL_UNPAID_ORDER_TIMEOUT", DEFAULT_UNPAID_ORDER_TIMEOUT.num_hours(), |n| *n > 0);
        let amount_tolerance = parse_or_default(&get, "SFL_AMOUNT_TOLERANCE_VND", Vnd::default(), |v| !v.is_negative());
        let reference_prefix = get("SFL_REFERENCE_PREFIX")
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| {
                let valid = !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());
                if !valid {
                    warn!(
                        "🪛️ SFL_REFERENCE_PREFIX must be alphanumeric. Using the default, {DEFAULT_REFERENCE_PREFIX}."
                    );
                }
                valid
            })
            .unwrap_or_else(|| DEFAULT_REFERENCE_PREFIX.to_string());
        let auto_create_deposits = parse_boolean_flag(get("SFL_AUTO_CREATE_DEPOSITS"), true);
        let referrals_enabled = parse_boolean_flag(get("SFL_REFERRAL_ENABLED"), true);
        let percent =
            parse_or_default(&get, "SFL_REFERRAL_PERCENT", DEFAULT_REFERRAL_PERCENT, |p| (0..=100).contains(p));
        let max_reward = parse_or_default(
            &get,
            "SFL_REFERRAL_MAX_REWARD_VND",
            Vnd::from(DEFAULT_REFERRAL_MAX_REWARD),
            |v| !v.is_negative(),
        );
        Self {
            database_url,
            max_connections,
            bank_feeds_file,
            poll_interval: StdDuration::from_secs(poll_secs),
            unpaid_order_timeout: Duration::hours(timeout_hrs),
            reconciliation: ReconciliationSettings { amount_tolerance, reference_prefix, auto_create_deposits },
            referrals: ReferralSettings { enabled: referrals_enabled, percent, max_reward },
        }
    }
}

fn parse_or_default<F, T, V>(get: &F, name: &str, default: T, valid: V) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
    V: Fn(&T) -> bool,
{
    let Some(raw) = get(name) else {
        debug!("🪛️ {name} is not set. Using the default value of {default}.");
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) if valid(&v) => v,
        Ok(v) => {
            warn!("🪛️ {v} is out of range for {name}. Using the default, {default}, instead.");
            default
        },
        Err(e) => {
            warn!("🪛️ Invalid configuration value for {name}. {e} Using the default, {default}, instead.");
            default
        },
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>();
        ServerConfig::from_source(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]);
        assert_eq!(config.database_url, "sqlite://data/storefront.db");
        assert_eq!(config.max_connections, 25);
        assert!(config.bank_feeds_file.is_none());
        assert_eq!(config.poll_interval, StdDuration::from_secs(300));
        assert_eq!(config.unpaid_order_timeout, Duration::hours(24));
        assert_eq!(config.reconciliation, ReconciliationSettings::default());
        assert_eq!(config.referrals.percent, 5);
        assert_eq!(config.referrals.max_reward, Vnd::from(250_000));
        assert!(config.referrals.enabled);
    }

    #[test]
    fn values_are_read() {
        let config = config_from(&[
            ("SFL_DATABASE_URL", "sqlite::memory:"),
            ("SFL_DB_MAX_CONNECTIONS", "4"),
            ("SFL_BANK_FEEDS_FILE", "/etc/storefront/feeds.json"),
            ("SFL_POLL_INTERVAL_SECS", "60"),
            ("SFL_UNPAID_ORDER_TIMEOUT", "2"),
            ("SFL_AMOUNT_TOLERANCE_VND", "1,000"),
            ("SFL_REFERENCE_PREFIX", "nap"),
            ("SFL_AUTO_CREATE_DEPOSITS", "no"),
            ("SFL_REFERRAL_ENABLED", "0"),
            ("SFL_REFERRAL_PERCENT", "10"),
            ("SFL_REFERRAL_MAX_REWARD_VND", "50000"),
        ]);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.bank_feeds_file, Some(PathBuf::from("/etc/storefront/feeds.json")));
        assert_eq!(config.poll_interval, StdDuration::from_secs(60));
        assert_eq!(config.unpaid_order_timeout, Duration::hours(2));
        assert_eq!(config.reconciliation.amount_tolerance, Vnd::from(1_000));
        assert_eq!(config.reconciliation.reference_prefix, "NAP");
        assert!(!config.reconciliation.auto_create_deposits);
        assert!(!config.referrals.enabled);
        assert_eq!(config.referrals.percent, 10);
        assert_eq!(config.referrals.max_reward, Vnd::from(50_000));
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config_from(&[
            ("SFL_DB_MAX_CONNECTIONS", "0"),
            ("SFL_BANK_FEEDS_FILE", "  "),
            ("SFL_POLL_INTERVAL_SECS", "soon"),
            ("SFL_UNPAID_ORDER_TIMEOUT", "-3"),
            ("SFL_AMOUNT_TOLERANCE_VND", "-500"),
            ("SFL_REFERENCE_PREFIX", "DE-P"),
            ("SFL_AUTO_CREATE_DEPOSITS", "perhaps"),
            ("SFL_REFERRAL_PERCENT", "150"),
            ("SFL_REFERRAL_MAX_REWARD_VND", "lots"),
        ]);
        assert_eq!(config.max_connections, 25);
        assert!(config.bank_feeds_file.is_none());
        assert_eq!(config.poll_interval, StdDuration::from_secs(300));
        assert_eq!(config.unpaid_order_timeout, Duration::hours(24));
        assert_eq!(config.reconciliation.amount_tolerance, Vnd::from(0));
        assert_eq!(config.reconciliation.reference_prefix, "DEP");
        assert!(config.reconciliation.auto_create_deposits);
        assert_eq!(config.referrals.percent, 5);
        assert_eq!(config.referrals.max_reward, Vnd::from(250_000));
    }
}
