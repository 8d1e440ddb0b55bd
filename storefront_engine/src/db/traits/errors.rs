use thiserror::Error;

use crate::db_types::{DepositStatus, OrderStatusType, Vnd};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("Insufficient funds. User {user_id} cannot cover {required}")]
    InsufficientFunds { user_id: String, required: Vnd },
    #[error("The resource is exhausted. {0}")]
    ResourceExhausted(String),
    #[error("This request has already been processed. {0}")]
    AlreadyProcessed(String),
    #[error("Order #{0} cannot be paid because it is {1}")]
    OrderNotPayable(i64, OrderStatusType),
    #[error("Bank feed '{feed}' is unavailable. {reason}")]
    ExternalFeedUnavailable { feed: String, reason: String },
    #[error("No wallet exists for user {0}")]
    WalletNotFound(String),
    #[error("A wallet already exists for user {0}")]
    WalletAlreadyExists(String),
    #[error("The requested order #{0} does not exist")]
    OrderNotFound(i64),
    #[error("The requested deposit request #{0} does not exist")]
    DepositNotFound(i64),
    #[error("Deposit request #{0} is already {1}")]
    DepositAlreadyDecided(i64, DepositStatus),
    #[error("The requested product #{0} does not exist")]
    ProductNotFound(i64),
    #[error("Coupon {0} does not exist")]
    CouponNotFound(String),
    #[error("Coupon {code} cannot be used. {reason}")]
    CouponNotApplicable { code: String, reason: String },
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("Illegal status change. {0}")]
    IllegalStatusChange(String),
    #[error("Referral error. {0}")]
    ReferralError(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for LedgerError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        LedgerError::DatabaseError(format!("Migration failed. {e}"))
    }
}
