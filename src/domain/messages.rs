//! Typed contract messages.
//!
//! Every execute and query payload the console sends has its own schema here,
//! so a shape mismatch is a compile error instead of a silent contract failure.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use super::error::AppError;
use super::types::{Amount, ContractAddresses};

/// Execute messages accepted by the bank contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankExecuteMsg {
    CreateAccount {
        account_name: String,
    },
    Withdraw {
        account: String,
        amount: Amount,
    },
    Transfer {
        from: String,
        to: String,
        amount: Amount,
    },
}

/// Hook message the bank contract decodes from a CW20 `send`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveMsg {
    Deposit { account: String },
}

/// Execute messages sent to the CW20 token contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenExecuteMsg {
    Send {
        contract: String,
        amount: Amount,
        /// Base64-encoded JSON of the hook message
        msg: String,
    },
}

/// Queries answered by the bank contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankQueryMsg {
    GetAccount { address: String },
    GetBalance { account: String },
}

/// Queries answered by the CW20 token contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenQueryMsg {
    Balance { address: String },
}

/// Response to `get_account`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountListResponse {
    pub account: Vec<String>,
}

/// Response to `get_balance` and to the token `balance` query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: Amount,
}

/// Wasm `MsgExecuteContract` as handed to the wallet for signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgExecuteContract {
    pub sender: String,
    pub contract: String,
    pub execute_msg: serde_json::Value,
}

/// Which contract a command is routed through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractChannel {
    Bank,
    Token,
}

impl ContractChannel {
    #[must_use]
    pub fn address<'a>(&self, contracts: &'a ContractAddresses) -> &'a str {
        match self {
            Self::Bank => &contracts.bank,
            Self::Token => &contracts.token,
        }
    }
}

/// A built execute payload together with its submission channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub channel: ContractChannel,
    pub msg: serde_json::Value,
}

impl Instruction {
    /// Wrap into a `MsgExecuteContract` signed by `sender`
    #[must_use]
    pub fn into_message(self, sender: &str, contracts: &ContractAddresses) -> MsgExecuteContract {
        MsgExecuteContract {
            sender: sender.to_string(),
            contract: self.channel.address(contracts).to_string(),
            execute_msg: self.msg,
        }
    }
}

/// Command kind, used for logging and for picking notification texts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    CreateAccount,
    Deposit,
    Withdraw,
    Transfer,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateAccount => "create_account",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The four domain operations, fully resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankCommand {
    CreateAccount {
        name: String,
    },
    Deposit {
        amount: Amount,
        account: String,
    },
    Withdraw {
        amount: Amount,
        account: String,
    },
    Transfer {
        amount: Amount,
        from: String,
        to: String,
    },
}

impl BankCommand {
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::CreateAccount { .. } => CommandKind::CreateAccount,
            Self::Deposit { .. } => CommandKind::Deposit,
            Self::Withdraw { .. } => CommandKind::Withdraw,
            Self::Transfer { .. } => CommandKind::Transfer,
        }
    }

    /// Build the contract payload. Inputs are forwarded as-is; the contract
    /// is responsible for rejecting them.
    pub fn instruction(&self, contracts: &ContractAddresses) -> Result<Instruction, AppError> {
        let (channel, msg) = match self {
            Self::CreateAccount { name } => (
                ContractChannel::Bank,
                serde_json::to_value(BankExecuteMsg::CreateAccount {
                    account_name: name.clone(),
                })?,
            ),
            Self::Deposit { amount, account } => {
                let hook = encode_binary(&ReceiveMsg::Deposit {
                    account: account.clone(),
                })?;
                (
                    ContractChannel::Token,
                    serde_json::to_value(TokenExecuteMsg::Send {
                        contract: contracts.bank.clone(),
                        amount: *amount,
                        msg: hook,
                    })?,
                )
            }
            Self::Withdraw { amount, account } => (
                ContractChannel::Bank,
                serde_json::to_value(BankExecuteMsg::Withdraw {
                    account: account.clone(),
                    amount: *amount,
                })?,
            ),
            Self::Transfer { amount, from, to } => (
                ContractChannel::Bank,
                serde_json::to_value(BankExecuteMsg::Transfer {
                    from: from.clone(),
                    to: to.clone(),
                    amount: *amount,
                })?,
            ),
        };
        Ok(Instruction { channel, msg })
    }
}

/// JSON-encode then base64-encode, the CosmWasm `Binary` convention
pub fn encode_binary<T: Serialize>(value: &T) -> Result<String, AppError> {
    let json = serde_json::to_vec(value)?;
    Ok(STANDARD.encode(json))
}
