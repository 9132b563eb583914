//! Infrastructure layer implementations.

pub mod blockchain;
pub mod wallet;

pub use blockchain::{LcdChainClient, LcdClientConfig};
pub use wallet::{HttpWalletBridge, WalletBridgeConfig};
