//! Error types for the application.

use thiserror::Error;

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Blockchain error: {0}")]
    Blockchain(#[from] BlockchainError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

/// Errors raised while talking to the chain
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Transaction not found: {0}")]
    TxNotFound(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error(
        "Transaction queued. To verify the status, please check the transaction hash: {tx_hash}"
    )]
    ConfirmationTimeout { tx_hash: String },

    #[error("Confirmation of {0} cancelled")]
    Cancelled(String),
}

/// Errors raised by the wallet boundary
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Wallet rejected the request: {0}")]
    Rejected(String),

    #[error("Wallet bridge unavailable: {0}")]
    Unavailable(String),
}

/// Input and state validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid view transition: {0}")]
    InvalidTransition(String),
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl AppError {
    /// Transaction hash carried by a confirmation timeout, if any
    #[must_use]
    pub fn timed_out_tx_hash(&self) -> Option<&str> {
        match self {
            Self::Blockchain(BlockchainError::ConfirmationTimeout { tx_hash }) => Some(tx_hash),
            _ => None,
        }
    }
}
