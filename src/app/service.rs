//! Command dispatch: build the payload, post it through the wallet, and wait
//! for confirmation.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::domain::{
    AppError, Amount, BankCommand, ChainClient, ContractAddresses, HealthResponse, HealthStatus,
    TxInfo, Wallet,
};

use super::confirmation::{ConfirmationConfig, ConfirmationEngine, PendingTransaction};

/// Dispatches bank commands and owns the confirmation engine
pub struct BankService {
    chain_client: Arc<dyn ChainClient>,
    wallet: Arc<dyn Wallet>,
    contracts: ContractAddresses,
    engine: ConfirmationEngine,
    cancel_tx: watch::Sender<bool>,
}

impl BankService {
    #[must_use]
    pub fn new(
        chain_client: Arc<dyn ChainClient>,
        wallet: Arc<dyn Wallet>,
        contracts: ContractAddresses,
        confirmation: ConfirmationConfig,
    ) -> Self {
        let engine = ConfirmationEngine::new(Arc::clone(&chain_client), confirmation);
        let (cancel_tx, _) = watch::channel(false);
        Self {
            chain_client,
            wallet,
            contracts,
            engine,
            cancel_tx,
        }
    }

    pub async fn create_account(&self, sender: &str, name: &str) -> Result<TxInfo, AppError> {
        self.execute(
            sender,
            &BankCommand::CreateAccount {
                name: name.to_string(),
            },
        )
        .await
    }

    pub async fn deposit(
        &self,
        sender: &str,
        amount: Amount,
        account: &str,
    ) -> Result<TxInfo, AppError> {
        self.execute(
            sender,
            &BankCommand::Deposit {
                amount,
                account: account.to_string(),
            },
        )
        .await
    }

    pub async fn withdraw(
        &self,
        sender: &str,
        amount: Amount,
        account: &str,
    ) -> Result<TxInfo, AppError> {
        self.execute(
            sender,
            &BankCommand::Withdraw {
                amount,
                account: account.to_string(),
            },
        )
        .await
    }

    pub async fn transfer(
        &self,
        sender: &str,
        amount: Amount,
        from: &str,
        to: &str,
    ) -> Result<TxInfo, AppError> {
        self.execute(
            sender,
            &BankCommand::Transfer {
                amount,
                from: from.to_string(),
                to: to.to_string(),
            },
        )
        .await
    }

    /// Submit `command` on behalf of `sender` and wait for it to confirm.
    ///
    /// Nothing is validated locally; the contract is the judge.
    #[instrument(skip(self, command), fields(command = %command.kind()))]
    async fn execute(&self, sender: &str, command: &BankCommand) -> Result<TxInfo, AppError> {
        let instruction = command.instruction(&self.contracts)?;
        let message = instruction.into_message(sender, &self.contracts);
        let contract = message.contract.clone();

        let tx_hash = self.wallet.post(vec![message]).await.map_err(|e| {
            warn!(contract = %contract, error = %e, "Wallet did not broadcast the command");
            e
        })?;
        info!(contract = %contract, tx_hash = %tx_hash, "Command broadcast");

        let pending = PendingTransaction::new(tx_hash);
        let mut cancel = self.cancel_tx.subscribe();
        self.engine.confirm(&pending, &mut cancel).await
    }

    /// Stop every confirmation loop currently waiting
    pub fn cancel_pending(&self) {
        self.cancel_tx.send_replace(true);
    }

    /// Perform health check on chain and wallet
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let chain = match self.chain_client.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        };
        let wallet = match self.wallet.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        };
        HealthResponse::new(chain, wallet)
    }
}
