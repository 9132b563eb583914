//! Test doubles shared by unit and integration tests.

pub mod mocks;

pub use mocks::{MOCK_WALLET_ADDRESS, MockChain, MockWallet};
