use serde::{Deserialize, Serialize};

use crate::db_types::{AllocationResult, DepositRequest, Order, Wallet, WalletTransaction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub payment: WalletTransaction,
}

impl OrderPaidEvent {
    pub fn new(order: Order, payment: WalletTransaction) -> Self {
        Self { order, payment }
    }
}

/// Published when an order was paid but could not be delivered in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortfallEvent {
    pub order: Order,
    pub allocations: Vec<AllocationResult>,
}

impl ShortfallEvent {
    pub fn total_shortfall(&self) -> i64 {
        self.allocations.iter().map(|a| a.shortfall).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositApprovedEvent {
    pub deposit: DepositRequest,
    pub transaction: WalletTransaction,
    /// Set when the approval came from a bank transfer rather than an admin.
    pub provider_tx_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRejectedEvent {
    pub deposit: DepositRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAdjustedEvent {
    pub wallet: Wallet,
    pub transaction: WalletTransaction,
}
