//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::{AppError, BlockchainError};
use super::messages::MsgExecuteContract;
use super::types::{TxHash, TxInfo, WalletConnection};

/// Read-side access to the chain through an LCD endpoint
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Check LCD connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Look up a transaction by hash.
    ///
    /// Returns `BlockchainError::TxNotFound` while it is not yet indexed.
    async fn tx_info(&self, tx_hash: &str) -> Result<TxInfo, AppError>;

    /// Run a smart query against `contract` and return the raw JSON result
    async fn contract_query(
        &self,
        contract: &str,
        query: serde_json::Value,
    ) -> Result<serde_json::Value, AppError>;
}

/// Typed wrapper over [`ChainClient::contract_query`]
pub async fn query_contract<Q, R>(
    client: &dyn ChainClient,
    contract: &str,
    query: &Q,
) -> Result<R, AppError>
where
    Q: Serialize + Sync,
    R: DeserializeOwned,
{
    let query = serde_json::to_value(query)?;
    let result = client.contract_query(contract, query).await?;
    serde_json::from_value(result).map_err(|e| {
        AppError::Blockchain(BlockchainError::RpcError(format!(
            "Unexpected query response: {}",
            e
        )))
    })
}

/// Browser-style wallet that holds the key and signs on the user's behalf
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Current connection status and active address
    async fn connection(&self) -> Result<WalletConnection, AppError>;

    /// Ask the wallet to connect
    async fn connect(&self) -> Result<WalletConnection, AppError>;

    /// Ask the wallet to disconnect
    async fn disconnect(&self) -> Result<WalletConnection, AppError>;

    /// Sign and broadcast the messages, returning the transaction hash
    async fn post(&self, msgs: Vec<MsgExecuteContract>) -> Result<TxHash, AppError>;

    /// Check wallet reachability
    async fn health_check(&self) -> Result<(), AppError> {
        self.connection().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::messages::BalanceResponse;
    use crate::domain::types::{Amount, ConnectionStatus};

    struct FixedChain(serde_json::Value);

    #[async_trait]
    impl ChainClient for FixedChain {
        async fn health_check(&self) -> Result<(), AppError> {
            Ok(())
        }

        async fn tx_info(&self, tx_hash: &str) -> Result<TxInfo, AppError> {
            Err(AppError::Blockchain(BlockchainError::TxNotFound(
                tx_hash.to_string(),
            )))
        }

        async fn contract_query(
            &self,
            _contract: &str,
            _query: serde_json::Value,
        ) -> Result<serde_json::Value, AppError> {
            Ok(self.0.clone())
        }
    }

    struct MinimalWallet;

    #[async_trait]
    impl Wallet for MinimalWallet {
        async fn connection(&self) -> Result<WalletConnection, AppError> {
            Ok(WalletConnection::disconnected())
        }

        async fn connect(&self) -> Result<WalletConnection, AppError> {
            Ok(WalletConnection::connected("terra1abc"))
        }

        async fn disconnect(&self) -> Result<WalletConnection, AppError> {
            Ok(WalletConnection::disconnected())
        }

        async fn post(&self, _msgs: Vec<MsgExecuteContract>) -> Result<TxHash, AppError> {
            Err(AppError::NotSupported("post".to_string()))
        }
    }

    #[tokio::test]
    async fn test_query_contract_decodes_typed_response() {
        let chain = FixedChain(serde_json::json!({"balance": "75"}));
        let resp: BalanceResponse =
            query_contract(&chain, "terra1bank", &serde_json::json!({"x": {}}))
                .await
                .unwrap();
        assert_eq!(resp.balance, Amount::new(75));
    }

    #[tokio::test]
    async fn test_query_contract_rejects_wrong_shape() {
        let chain = FixedChain(serde_json::json!({"unexpected": true}));
        let result: Result<BalanceResponse, _> =
            query_contract(&chain, "terra1bank", &serde_json::json!({})).await;
        assert!(matches!(
            result,
            Err(AppError::Blockchain(BlockchainError::RpcError(_)))
        ));
    }

    #[tokio::test]
    async fn test_wallet_default_health_check() {
        let wallet = MinimalWallet;
        assert!(wallet.health_check().await.is_ok());
        assert_eq!(
            wallet.connection().await.unwrap().status,
            ConnectionStatus::WalletNotConnected
        );
    }
}
