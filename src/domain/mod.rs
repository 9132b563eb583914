//! Domain layer containing core types, traits, and error definitions.

pub mod error;
pub mod fee;
pub mod messages;
pub mod traits;
pub mod types;
pub mod view;

pub use error::{AppError, BlockchainError, ConfigError, ValidationError, WalletError};
pub use fee::FeeEstimate;
pub use messages::{BankCommand, CommandKind, MsgExecuteContract};
pub use traits::{ChainClient, Wallet, query_contract};
pub use types::{
    Account, AggregatedBalances, Amount, ConnectionStatus, ContractAddresses, ErrorDetail,
    ErrorResponse, HealthResponse, HealthStatus, Notification, TxHash, TxInfo, WalletConnection,
};
pub use view::{Navigation, View};
