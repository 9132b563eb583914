//! Application state management.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{AggregatedBalances, ChainClient, ContractAddresses, Notification, View, Wallet};

use super::confirmation::ConfirmationConfig;
use super::controller::Controller;
use super::prefetch::PrefetchAggregator;
use super::service::BankService;

/// Everything a renderer needs, replaced as a whole on every update
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct Session {
    /// Address of the connected wallet
    pub wallet: Option<String>,
    pub view: View,
    /// Snapshot from the last completed prefetch
    pub balances: AggregatedBalances,
    /// True while a prefetch is in flight
    pub loading: bool,
    pub notification: Option<Notification>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Controller>,
    pub service: Arc<BankService>,
}

impl AppState {
    /// Create a new application state
    #[must_use]
    pub fn new(
        chain_client: Arc<dyn ChainClient>,
        wallet: Arc<dyn Wallet>,
        contracts: ContractAddresses,
        confirmation: ConfirmationConfig,
    ) -> Self {
        let service = Arc::new(BankService::new(
            Arc::clone(&chain_client),
            Arc::clone(&wallet),
            contracts.clone(),
            confirmation,
        ));
        let prefetcher = PrefetchAggregator::new(chain_client, contracts);
        let controller = Arc::new(Controller::new(Arc::clone(&service), prefetcher, wallet));
        Self {
            service,
            controller,
        }
    }
}
