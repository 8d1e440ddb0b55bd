use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BankFeedError {
    #[error("Could not initialize bank feed client: {0}")]
    Initialization(String),
    #[error("Invalid bank feed configuration: {0}")]
    Configuration(String),
    #[error("Request to the bank failed: {0}")]
    RequestError(String),
    #[error("Bank responded with error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not understand the bank's response: {0}")]
    InvalidResponse(String),
}
