use storefront_engine::{bank_feeds::BankFeedError, LedgerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(#[from] LedgerError),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Bank feed configuration could not be used. {0}")]
    BankFeedError(#[from] BankFeedError),
    #[error("A background worker stopped unexpectedly. {0}")]
    WorkerStopped(String),
}
