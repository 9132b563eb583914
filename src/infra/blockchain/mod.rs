//! Chain access over the LCD REST API.

pub mod lcd;

pub use lcd::{HttpLcdProvider, LcdChainClient, LcdClientConfig, LcdProvider};
