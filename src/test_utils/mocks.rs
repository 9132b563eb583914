//! Mock implementations for testing.
//!
//! `MockChain` keeps an in-memory bank and token ledger and answers the same
//! queries the real contracts do; `MockWallet` posts messages into it.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::messages::{
    AccountListResponse, BalanceResponse, BankExecuteMsg, BankQueryMsg, ReceiveMsg,
    TokenExecuteMsg, TokenQueryMsg,
};
use crate::domain::{
    AppError, Amount, BlockchainError, ChainClient, ContractAddresses, MsgExecuteContract,
    TxHash, TxInfo, Wallet, WalletConnection, WalletError, fee,
};

/// Address used by `MockWallet::new`
pub const MOCK_WALLET_ADDRESS: &str = "terra1mockwalletaddress";

#[derive(Debug, Clone, Default)]
struct Ledger {
    /// account name -> (owner address, balance)
    accounts: BTreeMap<String, (String, u128)>,
    /// owner address -> account names in creation order
    owned: HashMap<String, Vec<String>>,
    tokens: HashMap<String, u128>,
}

impl Ledger {
    fn apply(
        &mut self,
        contracts: &ContractAddresses,
        msg: &MsgExecuteContract,
    ) -> Result<(), String> {
        if msg.contract == contracts.bank {
            let exec: BankExecuteMsg =
                serde_json::from_value(msg.execute_msg.clone()).map_err(|e| e.to_string())?;
            self.apply_bank(&msg.sender, exec)
        } else if msg.contract == contracts.token {
            let exec: TokenExecuteMsg =
                serde_json::from_value(msg.execute_msg.clone()).map_err(|e| e.to_string())?;
            self.apply_token(contracts, &msg.sender, exec)
        } else {
            Err(format!("unknown contract {}", msg.contract))
        }
    }

    fn apply_bank(&mut self, sender: &str, exec: BankExecuteMsg) -> Result<(), String> {
        match exec {
            BankExecuteMsg::CreateAccount { account_name } => {
                if self.accounts.contains_key(&account_name) {
                    return Err(format!("account {} already exists", account_name));
                }
                self.accounts
                    .insert(account_name.clone(), (sender.to_string(), 0));
                self.owned
                    .entry(sender.to_string())
                    .or_default()
                    .push(account_name);
                Ok(())
            }
            BankExecuteMsg::Withdraw { account, amount } => {
                self.debit_owned(sender, &account, amount.value())?;
                *self.tokens.entry(sender.to_string()).or_default() += amount.value();
                Ok(())
            }
            BankExecuteMsg::Transfer { from, to, amount } => {
                let (to_owner, _) = self
                    .accounts
                    .get(&to)
                    .cloned()
                    .ok_or_else(|| format!("account {} not found", to))?;
                self.debit_owned(sender, &from, amount.value())?;
                let charged = if to_owner == sender {
                    0
                } else {
                    fee::transfer_fee(amount).value()
                };
                if let Some((_, balance)) = self.accounts.get_mut(&to) {
                    *balance += amount.value() - charged;
                }
                Ok(())
            }
        }
    }

    fn apply_token(
        &mut self,
        contracts: &ContractAddresses,
        sender: &str,
        exec: TokenExecuteMsg,
    ) -> Result<(), String> {
        let TokenExecuteMsg::Send {
            contract,
            amount,
            msg,
        } = exec;
        if contract != contracts.bank {
            return Err(format!("send to unexpected contract {}", contract));
        }
        let decoded = STANDARD.decode(msg).map_err(|e| e.to_string())?;
        let ReceiveMsg::Deposit { account } =
            serde_json::from_slice(&decoded).map_err(|e| e.to_string())?;

        if !self.accounts.contains_key(&account) {
            return Err(format!("account {} not found", account));
        }
        let held = self.tokens.entry(sender.to_string()).or_default();
        if *held < amount.value() {
            return Err("insufficient token balance".to_string());
        }
        *held -= amount.value();
        if let Some((_, balance)) = self.accounts.get_mut(&account) {
            *balance += amount.value();
        }
        Ok(())
    }

    fn debit_owned(&mut self, sender: &str, account: &str, amount: u128) -> Result<(), String> {
        let (owner, balance) = self
            .accounts
            .get_mut(account)
            .ok_or_else(|| format!("account {} not found", account))?;
        if owner.as_str() != sender {
            return Err(format!("account {} is not owned by sender", account));
        }
        if *balance < amount {
            return Err("insufficient balance".to_string());
        }
        *balance -= amount;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct RecordedTx {
    info: TxInfo,
    polls_remaining: u32,
}

#[derive(Debug, Default)]
struct ChainState {
    ledger: Ledger,
    txs: HashMap<TxHash, RecordedTx>,
    lookups: Vec<Instant>,
    failing_balances: HashSet<String>,
    fail_account_list: bool,
    polls_before_visible: u32,
    never_confirm: bool,
    query_delay: Duration,
    next_height: u64,
}

/// In-memory chain with a bank contract and a CW20 token
pub struct MockChain {
    contracts: ContractAddresses,
    state: Mutex<ChainState>,
    is_healthy: AtomicBool,
}

impl MockChain {
    #[must_use]
    pub fn new(contracts: ContractAddresses) -> Self {
        Self {
            contracts,
            state: Mutex::new(ChainState::default()),
            is_healthy: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn default_contracts() -> ContractAddresses {
        ContractAddresses {
            bank: "terra1bankcontract".to_string(),
            token: "terra1tokencontract".to_string(),
        }
    }

    #[must_use]
    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn set_token_balance(&self, address: &str, amount: u128) {
        self.state
            .lock()
            .unwrap()
            .ledger
            .tokens
            .insert(address.to_string(), amount);
    }

    /// Seed an account directly, bypassing transactions
    pub fn seed_account(&self, owner: &str, name: &str, balance: u128) {
        let mut state = self.state.lock().unwrap();
        state
            .ledger
            .accounts
            .insert(name.to_string(), (owner.to_string(), balance));
        state
            .ledger
            .owned
            .entry(owner.to_string())
            .or_default()
            .push(name.to_string());
    }

    /// Make `get_balance` for `account` fail
    pub fn fail_balance_of(&self, account: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_balances
            .insert(account.to_string());
    }

    pub fn set_fail_account_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_account_list = fail;
    }

    /// Number of lookups that miss before a new transaction becomes visible
    pub fn set_polls_before_visible(&self, polls: u32) {
        self.state.lock().unwrap().polls_before_visible = polls;
    }

    /// Never report any transaction as found
    pub fn set_never_confirm(&self, never: bool) {
        self.state.lock().unwrap().never_confirm = never;
    }

    /// Delay every contract query by `delay`
    pub fn set_query_delay(&self, delay: Duration) {
        self.state.lock().unwrap().query_delay = delay;
    }

    /// Instants of every `tx_info` call, in order
    pub fn lookups(&self) -> Vec<Instant> {
        self.state.lock().unwrap().lookups.clone()
    }

    pub fn account_names(&self, owner: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .ledger
            .owned
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    pub fn account_balance(&self, name: &str) -> Option<u128> {
        self.state
            .lock()
            .unwrap()
            .ledger
            .accounts
            .get(name)
            .map(|(_, balance)| *balance)
    }

    pub fn token_balance(&self, address: &str) -> u128 {
        self.state
            .lock()
            .unwrap()
            .ledger
            .tokens
            .get(address)
            .copied()
            .unwrap_or_default()
    }

    /// Execute `msgs` as one transaction and record it.
    ///
    /// The ledger only changes if every message succeeds; otherwise the
    /// transaction is recorded with a non-zero code.
    pub fn execute(&self, msgs: &[MsgExecuteContract]) -> TxHash {
        let mut state = self.state.lock().unwrap();
        let mut staged = state.ledger.clone();
        let outcome = msgs
            .iter()
            .try_for_each(|msg| staged.apply(&self.contracts, msg));

        state.next_height += 1;
        let height = state.next_height;
        let tx_hash = format!("{:064X}", height);
        let (code, raw_log) = match outcome {
            Ok(()) => {
                state.ledger = staged;
                (0, "[]".to_string())
            }
            Err(reason) => (5, format!("execute wasm contract failed: {}", reason)),
        };

        let polls_remaining = state.polls_before_visible;
        state.txs.insert(
            tx_hash.clone(),
            RecordedTx {
                info: TxInfo {
                    txhash: tx_hash.clone(),
                    height: height.to_string(),
                    code,
                    raw_log,
                    ..Default::default()
                },
                polls_remaining,
            },
        );
        tx_hash
    }

    fn bank_query(&self, query: BankQueryMsg) -> Result<serde_json::Value, AppError> {
        let state = self.state.lock().unwrap();
        let value = match query {
            BankQueryMsg::GetAccount { address } => {
                if state.fail_account_list {
                    return Err(query_failed("account list unavailable"));
                }
                serde_json::to_value(AccountListResponse {
                    account: state.ledger.owned.get(&address).cloned().unwrap_or_default(),
                })?
            }
            BankQueryMsg::GetBalance { account } => {
                if state.failing_balances.contains(&account) {
                    return Err(query_failed("balance unavailable"));
                }
                let (_, balance) = state
                    .ledger
                    .accounts
                    .get(&account)
                    .ok_or_else(|| query_failed("account not found"))?;
                serde_json::to_value(BalanceResponse {
                    balance: Amount::new(*balance),
                })?
            }
        };
        Ok(value)
    }

    fn token_query(&self, query: TokenQueryMsg) -> Result<serde_json::Value, AppError> {
        let TokenQueryMsg::Balance { address } = query;
        let balance = self.token_balance(&address);
        Ok(serde_json::to_value(BalanceResponse {
            balance: Amount::new(balance),
        })?)
    }
}

fn query_failed(message: &str) -> AppError {
    AppError::Blockchain(BlockchainError::RpcError(message.to_string()))
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new(Self::default_contracts())
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Blockchain(BlockchainError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        Ok(())
    }

    async fn tx_info(&self, tx_hash: &str) -> Result<TxInfo, AppError> {
        let mut state = self.state.lock().unwrap();
        state.lookups.push(Instant::now());
        let not_found = || AppError::Blockchain(BlockchainError::TxNotFound(tx_hash.to_string()));

        if state.never_confirm {
            return Err(not_found());
        }
        let tx = state.txs.get_mut(tx_hash).ok_or_else(not_found)?;
        if tx.polls_remaining > 0 {
            tx.polls_remaining -= 1;
            return Err(not_found());
        }
        Ok(tx.info.clone())
    }

    async fn contract_query(
        &self,
        contract: &str,
        query: serde_json::Value,
    ) -> Result<serde_json::Value, AppError> {
        let delay = self.state.lock().unwrap().query_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if contract == self.contracts.bank {
            let query = serde_json::from_value(query)
                .map_err(|e| query_failed(&format!("unknown bank query: {}", e)))?;
            self.bank_query(query)
        } else if contract == self.contracts.token {
            let query = serde_json::from_value(query)
                .map_err(|e| query_failed(&format!("unknown token query: {}", e)))?;
            self.token_query(query)
        } else {
            Err(query_failed("no such contract"))
        }
    }
}

/// Wallet that signs with a fixed address and broadcasts into a [`MockChain`]
pub struct MockWallet {
    chain: Arc<MockChain>,
    address: String,
    connection: Mutex<WalletConnection>,
    reject_posts: AtomicBool,
    unavailable: AtomicBool,
    posted: Mutex<Vec<Vec<MsgExecuteContract>>>,
}

impl MockWallet {
    /// Disconnected wallet for [`MOCK_WALLET_ADDRESS`]
    #[must_use]
    pub fn new(chain: Arc<MockChain>) -> Self {
        Self::with_address(chain, MOCK_WALLET_ADDRESS)
    }

    #[must_use]
    pub fn with_address(chain: Arc<MockChain>, address: &str) -> Self {
        Self {
            chain,
            address: address.to_string(),
            connection: Mutex::new(WalletConnection::disconnected()),
            reject_posts: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
            posted: Mutex::new(Vec::new()),
        }
    }

    /// Already connected wallet for [`MOCK_WALLET_ADDRESS`]
    #[must_use]
    pub fn connected(chain: Arc<MockChain>) -> Self {
        let wallet = Self::new(chain);
        *wallet.connection.lock().unwrap() = WalletConnection::connected(&wallet.address);
        wallet
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Make the user decline every signing request
    pub fn set_reject_posts(&self, reject: bool) {
        self.reject_posts.store(reject, Ordering::Relaxed);
    }

    /// Simulate the bridge being down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Every batch of messages handed to `post`
    pub fn posted(&self) -> Vec<Vec<MsgExecuteContract>> {
        self.posted.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(AppError::Wallet(WalletError::Unavailable(
                "bridge offline".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Wallet for MockWallet {
    async fn connection(&self) -> Result<WalletConnection, AppError> {
        self.check_available()?;
        Ok(self.connection.lock().unwrap().clone())
    }

    async fn connect(&self) -> Result<WalletConnection, AppError> {
        self.check_available()?;
        let mut connection = self.connection.lock().unwrap();
        *connection = WalletConnection::connected(&self.address);
        Ok(connection.clone())
    }

    async fn disconnect(&self) -> Result<WalletConnection, AppError> {
        self.check_available()?;
        let mut connection = self.connection.lock().unwrap();
        *connection = WalletConnection::disconnected();
        Ok(connection.clone())
    }

    async fn post(&self, msgs: Vec<MsgExecuteContract>) -> Result<TxHash, AppError> {
        self.check_available()?;
        if self.reject_posts.load(Ordering::Relaxed) {
            return Err(AppError::Wallet(WalletError::Rejected(
                "User denied".to_string(),
            )));
        }
        if self.connection.lock().unwrap().active_address().is_none() {
            return Err(AppError::Wallet(WalletError::NotConnected));
        }
        self.posted.lock().unwrap().push(msgs.clone());
        Ok(self.chain.execute(&msgs))
    }
}
