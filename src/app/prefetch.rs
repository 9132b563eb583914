//! Rebuilds the account list and balances from chain state.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{instrument, warn};

use crate::domain::messages::{AccountListResponse, BalanceResponse, BankQueryMsg, TokenQueryMsg};
use crate::domain::{
    Account, AggregatedBalances, Amount, ChainClient, ContractAddresses, query_contract,
};

/// Aggregates account and balance queries into one snapshot.
///
/// Query failures never escape: a failed list query yields no accounts, a
/// failed balance query yields zero for that account only.
#[derive(Clone)]
pub struct PrefetchAggregator {
    chain_client: Arc<dyn ChainClient>,
    contracts: ContractAddresses,
}

impl PrefetchAggregator {
    #[must_use]
    pub fn new(chain_client: Arc<dyn ChainClient>, contracts: ContractAddresses) -> Self {
        Self {
            chain_client,
            contracts,
        }
    }

    /// Fetch a fresh snapshot for `wallet`. No wallet means an empty snapshot
    /// and no chain traffic.
    #[instrument(skip(self))]
    pub async fn fetch(&self, wallet: Option<&str>) -> AggregatedBalances {
        let Some(address) = wallet else {
            return AggregatedBalances::empty();
        };

        let (accounts, token_balance) =
            tokio::join!(self.fetch_accounts(address), self.fetch_token_balance(address));

        AggregatedBalances {
            accounts,
            token_balance,
        }
    }

    async fn fetch_accounts(&self, address: &str) -> Vec<Account> {
        let query = BankQueryMsg::GetAccount {
            address: address.to_string(),
        };
        let names = match query_contract::<_, AccountListResponse>(
            self.chain_client.as_ref(),
            &self.contracts.bank,
            &query,
        )
        .await
        {
            Ok(resp) => resp.account,
            Err(e) => {
                warn!(address = %address, error = %e, "Account list query failed");
                return Vec::new();
            }
        };

        join_all(names.into_iter().map(|name| async move {
            let balance = self.fetch_account_balance(&name).await;
            Account { name, balance }
        }))
        .await
    }

    async fn fetch_account_balance(&self, account: &str) -> Amount {
        let query = BankQueryMsg::GetBalance {
            account: account.to_string(),
        };
        match query_contract::<_, BalanceResponse>(
            self.chain_client.as_ref(),
            &self.contracts.bank,
            &query,
        )
        .await
        {
            Ok(resp) => resp.balance,
            Err(e) => {
                warn!(account = %account, error = %e, "Balance query failed, showing zero");
                Amount::ZERO
            }
        }
    }

    async fn fetch_token_balance(&self, address: &str) -> Amount {
        let query = TokenQueryMsg::Balance {
            address: address.to_string(),
        };
        match query_contract::<_, BalanceResponse>(
            self.chain_client.as_ref(),
            &self.contracts.token,
            &query,
        )
        .await
        {
            Ok(resp) => resp.balance,
            Err(e) => {
                warn!(address = %address, error = %e, "Token balance query failed, showing zero");
                Amount::ZERO
            }
        }
    }
}
