//! Domain types shared by the controller, the chain client and the API.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use utoipa::ToSchema;

use super::error::ValidationError;

/// Token quantity in the smallest unit.
///
/// Serialized as a decimal string, matching the contract's `Uint128`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, ToSchema)]
#[schema(value_type = String, example = "100")]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    #[must_use]
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u128 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Coerce raw form input into an amount.
    ///
    /// Blank input means "no amount yet" and yields `Ok(None)`.
    pub fn parse_input(input: &str) -> Result<Option<Self>, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed.parse().map(Some)
    }
}

impl FromStr for Amount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Self)
            .map_err(|_| ValidationError::InvalidField {
                field: "amount".to_string(),
                message: format!("'{}' is not a whole token amount", s),
            })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl de::Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string or unsigned integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(u128::from(v)))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// A named sub-account owned by the connected wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    #[schema(example = "Savings")]
    pub name: String,
    pub balance: Amount,
}

impl Account {
    #[must_use]
    pub fn new(name: impl Into<String>, balance: Amount) -> Self {
        Self {
            name: name.into(),
            balance,
        }
    }
}

/// Snapshot produced by one prefetch cycle. Never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct AggregatedBalances {
    pub accounts: Vec<Account>,
    pub token_balance: Amount,
}

impl AggregatedBalances {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Opaque transaction hash returned by the wallet
pub type TxHash = String;

/// Confirmed transaction as reported by the LCD `tx_response`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct TxInfo {
    pub txhash: TxHash,
    pub height: String,
    /// Zero on success, the module error code otherwise
    pub code: u32,
    pub raw_log: String,
    pub gas_wanted: String,
    pub gas_used: String,
    pub timestamp: String,
}

impl TxInfo {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Addresses of the two contracts the console talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ContractAddresses {
    /// Primary banking contract
    pub bank: String,
    /// CW20 token contract
    pub token: String,
}

/// User-facing failure notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    #[schema(example = "Deposit Error")]
    pub title: String,
    #[schema(example = "Insufficient balance")]
    pub message: String,
    /// Present when confirmation timed out and the user should check manually
    pub tx_hash: Option<TxHash>,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    #[must_use]
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            tx_hash: None,
            raised_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_tx_hash(mut self, tx_hash: impl Into<TxHash>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }
}

/// Wallet connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    WalletNotConnected,
    WalletConnected,
}

/// Connection status together with the active address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WalletConnection {
    pub status: ConnectionStatus,
    pub address: Option<String>,
}

impl WalletConnection {
    #[must_use]
    pub fn connected(address: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::WalletConnected,
            address: Some(address.into()),
        }
    }

    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            status: ConnectionStatus::WalletNotConnected,
            address: None,
        }
    }

    /// Active address, only when the status says connected
    #[must_use]
    pub fn active_address(&self) -> Option<&str> {
        match self.status {
            ConnectionStatus::WalletConnected => self.address.as_deref(),
            ConnectionStatus::WalletNotConnected => None,
        }
    }
}

/// Health status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub chain: HealthStatus,
    pub wallet: HealthStatus,
    pub timestamp: DateTime<Utc>,
    #[schema(example = "0.1.0")]
    pub version: String,
}

impl HealthResponse {
    /// The chain is required; a missing wallet bridge only degrades the service.
    #[must_use]
    pub fn new(chain: HealthStatus, wallet: HealthStatus) -> Self {
        let status = match (chain, wallet) {
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        };
        Self {
            status,
            chain,
            wallet,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error response structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    #[schema(example = "validation_error")]
    pub r#type: String,
    pub message: String,
}
