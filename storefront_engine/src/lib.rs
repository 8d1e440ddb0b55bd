//! Storefront Ledger Engine
//!
//! The money-and-inventory core of a digital goods storefront that sells for Vietnamese dong. Users top up a wallet by
//! bank transfer, and spend the balance on products that are delivered instantly from a stock pool.
//!
//! The library is divided into these main sections:
//! 1. Database management ([`mod@db`]). SQLite is the supported backend. Callers should not need to touch the
//!    database directly; the data types it stores live in [`db_types`] and are public.
//! 2. The public API ([`mod@ledger_api`]): wallets and the ledger, deposits, bank reconciliation, checkout, coupons,
//!    inventory and referrals. Each API object is generic over the backend traits it needs.
//! 3. Bank feed clients ([`bank_feeds`]), which the reconciliation API polls for incoming transfers.
//!
//! Money never moves without a ledger entry, and every balance change is guarded by a conditional write, so concurrent
//! requests cannot overdraw a wallet, double-credit a transfer or hand out the same stock twice.
//!
//! The engine also emits [`events`] after each committed change (order paid, stock shortfall, deposit approved or
//! rejected, wallet adjusted) that hooks can subscribe to.
mod db;

pub mod bank_feeds;
pub mod db_types;
pub mod events;
pub mod helpers;
mod ledger_api;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, BANK_SYNC_ACTOR};
pub use db::traits::{
    AdjustmentDirection,
    CouponManagement,
    CouponRedemption,
    CreditOutcome,
    CreditTarget,
    DepositDecision,
    DepositManagement,
    InventoryManagement,
    LedgerAudit,
    LedgerError,
    OrderManagement,
    OrderPayment,
    ReconciliationManagement,
    ReferralManagement,
    WalletManagement,
    WalletUpdate,
    WriteOutcome,
};
pub use ledger_api::{
    checkout_api::CheckoutApi,
    coupon_api::CouponApi,
    deposit_api::DepositApi,
    inventory_api::InventoryApi,
    objects,
    reconciliation_api::ReconciliationApi,
    referral_api::ReferralApi,
    wallet_api::WalletApi,
};
