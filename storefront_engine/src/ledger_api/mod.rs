//! # Storefront ledger public API
//!
//! The `ledger_api` module is what the rest of the storefront talks to. Each API object wraps a storage backend that
//! implements the traits it needs, plus the event producers it publishes to.
//!
//! * [`wallet_api`] opens wallets, applies manual adjustments and audits the ledger.
//! * [`deposit_api`] opens deposit requests and lets admins approve or reject them.
//! * [`reconciliation_api`] polls the bank feeds and approves deposits that the bank says have been paid.
//! * [`checkout_api`] places and pays for orders, and handles their expiry and review.
//! * [`coupon_api`] creates coupons and redeems them against a bounded use counter.
//! * [`inventory_api`] administers product stock.
//! * [`referral_api`] records referrals and pays referral rewards.
//!
//! # API usage
//!
//! ```rust,ignore
//! use storefront_engine::{CheckoutApi, SqliteDatabase, events::EventProducers};
//! let db = SqliteDatabase::new_with_url("sqlite://data/storefront.db", 5).await?;
//! let api = CheckoutApi::new(db, EventProducers::default());
//! let payment = api.pay_order(order_id, "user123").await?;
//! ```
pub mod checkout_api;
pub mod coupon_api;
pub mod deposit_api;
pub mod inventory_api;
pub mod objects;
pub mod reconciliation_api;
pub mod referral_api;
pub mod wallet_api;
