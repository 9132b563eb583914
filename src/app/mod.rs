//! Application layer containing the controller, command dispatch and shared state.

pub mod confirmation;
pub mod controller;
pub mod prefetch;
pub mod service;
pub mod state;

pub use confirmation::{ConfirmationConfig, ConfirmationEngine, PendingTransaction};
pub use controller::{CommandRequest, Controller, failure_notification};
pub use prefetch::PrefetchAggregator;
pub use service::BankService;
pub use state::{AppState, Session};
