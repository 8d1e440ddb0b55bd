//! # Backend contracts
//!
//! These traits define what a storage backend has to provide to the storefront ledger APIs.
//!
//! * [`WalletManagement`] is the balance store and its ledger.
//! * [`DepositManagement`] handles the deposit request state machine.
//! * [`ReconciliationManagement`] stores the outcome of matching bank credits.
//! * [`InventoryManagement`] keeps the product stock pools and hands out stock.
//! * [`OrderManagement`] stores orders and runs the payment transaction.
//! * [`CouponManagement`] keeps the bounded coupon counters.
//! * [`ReferralManagement`] records referrals and pays referral rewards.
//!
//! All backend methods return [`LedgerError`].
mod coupon_management;
mod data_objects;
mod deposit_management;
mod errors;
mod inventory_management;
mod order_management;
mod reconciliation_management;
mod referral_management;
mod wallet_management;

pub use coupon_management::CouponManagement;
pub use data_objects::{
    AdjustmentDirection,
    CouponRedemption,
    CreditOutcome,
    CreditTarget,
    DepositDecision,
    LedgerAudit,
    OrderPayment,
    WalletUpdate,
    WriteOutcome,
};
pub use deposit_management::DepositManagement;
pub use errors::LedgerError;
pub use inventory_management::InventoryManagement;
pub use order_management::OrderManagement;
pub use reconciliation_management::ReconciliationManagement;
pub use referral_management::ReferralManagement;
pub use wallet_management::WalletManagement;
