//! Wallet boundary implementations.

pub mod bridge;

pub use bridge::{HttpWalletBridge, WalletBridgeConfig};
