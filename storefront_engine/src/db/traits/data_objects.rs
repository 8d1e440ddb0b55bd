use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::{AllocationResult, DepositRequest, Order, Vnd, Wallet, WalletTransaction};

/// The result of a guarded ("update ... where <condition>") write. `Applied` carries whatever the write returned;
/// `Rejected` means the condition did not hold and no row was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome<T> {
    Applied(T),
    Rejected,
}

impl<T> WriteOutcome<T> {
    pub fn from_row(row: Option<T>) -> Self {
        match row {
            Some(v) => WriteOutcome::Applied(v),
            None => WriteOutcome::Rejected,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            WriteOutcome::Applied(v) => Some(v),
            WriteOutcome::Rejected => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentDirection {
    Credit,
    Debit,
}

impl AdjustmentDirection {
    pub fn apply_sign(&self, amount: Vnd) -> Vnd {
        match self {
            AdjustmentDirection::Credit => amount,
            AdjustmentDirection::Debit => -amount,
        }
    }
}

impl Display for AdjustmentDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjustmentDirection::Credit => write!(f, "credit"),
            AdjustmentDirection::Debit => write!(f, "debit"),
        }
    }
}

/// A wallet mutation together with the ledger entry that documents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletUpdate {
    pub wallet: Wallet,
    pub transaction: WalletTransaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositDecision {
    pub deposit: DepositRequest,
    /// Present for approvals only.
    pub transaction: Option<WalletTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayment {
    pub order: Order,
    pub payment: WalletTransaction,
    pub allocations: Vec<AllocationResult>,
}

impl OrderPayment {
    /// Total number of items that could not be delivered
    pub fn shortfall(&self) -> i64 {
        self.allocations.iter().map(|a| a.shortfall).sum()
    }

    pub fn is_partial(&self) -> bool {
        self.shortfall() > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponRedemption {
    pub code: String,
    pub discount: Vnd,
    pub final_total: Vnd,
}

/// How a bank credit is to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditTarget {
    /// Approve this pending deposit request.
    Deposit(i64),
    /// No request matched, but the memo names a user with a wallet. Open and approve a request in one go.
    AutoCreate { user_id: String, reference_code: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditOutcome {
    Credited(DepositDecision),
    /// The provider transaction id has already been credited.
    Duplicate,
    /// The deposit request was no longer pending when the credit was applied.
    DepositNotPending(i64),
}

/// Result of replaying a user's ledger against their wallet balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAudit {
    pub user_id: String,
    pub entries: usize,
    pub replayed_balance: Vnd,
    pub wallet_balance: Vnd,
    /// Ids of entries whose `balance_after` does not equal the running total at that point.
    pub inconsistent_entries: Vec<i64>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.replayed_balance == self.wallet_balance && self.inconsistent_entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_outcome() {
        assert!(WriteOutcome::from_row(Some(1)).is_applied());
        assert_eq!(WriteOutcome::<i32>::from_row(None), WriteOutcome::Rejected);
        assert_eq!(WriteOutcome::Applied(3).applied(), Some(3));
    }

    #[test]
    fn adjustment_sign() {
        assert_eq!(AdjustmentDirection::Debit.apply_sign(Vnd::from(10)), Vnd::from(-10));
        assert_eq!(AdjustmentDirection::Credit.apply_sign(Vnd::from(10)), Vnd::from(10));
    }
}
