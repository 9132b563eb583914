//! Advisory transfer fee estimate.
//!
//! The contract deducts the real fee; this only drives the hint shown next to
//! the transfer form.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::types::{Account, Amount};

/// Percentage divisor applied to transfers leaving the wallet's own accounts
pub const FEE_DIVISOR: u128 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeEstimate {
    /// Recipient is one of the sender's own accounts
    NoFee,
    Charged { fee: Amount, receive: Amount },
}

impl fmt::Display for FeeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFee => f.write_str("no fee"),
            Self::Charged { fee, receive } => {
                write!(f, "fee 1% = {} TOKEN | Receive = {} TOKEN", fee, receive)
            }
        }
    }
}

/// Fee for sending `amount` to an account the sender does not own
#[must_use]
pub fn transfer_fee(amount: Amount) -> Amount {
    Amount::new(amount.value() / FEE_DIVISOR)
}

/// Estimate the fee for a transfer to `recipient`.
///
/// Returns `None` while the amount is absent or zero, so no text is shown.
#[must_use]
pub fn estimate(
    amount: Option<Amount>,
    recipient: Option<&str>,
    own_accounts: &[Account],
) -> Option<FeeEstimate> {
    let amount = amount.filter(|a| !a.is_zero())?;

    if let Some(to) = recipient
        && own_accounts.iter().any(|a| a.name == to)
    {
        return Some(FeeEstimate::NoFee);
    }

    let fee = transfer_fee(amount);
    Some(FeeEstimate::Charged {
        fee,
        receive: Amount::new(amount.value() - fee.value()),
    })
}
