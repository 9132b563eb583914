//! Single-active-view navigation model.
//!
//! There is no back-stack: every non-Account view returns to Account.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    /// Account list, the initial view
    #[default]
    Account,
    AddAccount,
    Deposit {
        account: String,
    },
    Withdraw {
        account: String,
    },
    Transfer {
        account: String,
    },
}

impl View {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::AddAccount => "add_account",
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::Transfer { .. } => "transfer",
        }
    }

    /// Apply a navigation event, returning the next view.
    ///
    /// Invalid pairs are rejected and the caller keeps the current view.
    pub fn transition(&self, event: Navigation) -> Result<View, ValidationError> {
        match (self, event) {
            (Self::Account, Navigation::OpenAddAccount) => Ok(Self::AddAccount),
            (Self::Account, Navigation::OpenDeposit { account }) => Ok(Self::Deposit { account }),
            (Self::Account, Navigation::OpenWithdraw { account }) => {
                Ok(Self::Withdraw { account })
            }
            (Self::Account, Navigation::OpenTransfer { account }) => {
                Ok(Self::Transfer { account })
            }
            (Self::Account, event) => Err(ValidationError::InvalidTransition(format!(
                "{} is not available from the account view",
                event.name()
            ))),
            (_, Navigation::GoBack | Navigation::CommandFinished) => Ok(Self::Account),
            (current, event) => Err(ValidationError::InvalidTransition(format!(
                "{} is not available from the {} view",
                event.name(),
                current.name()
            ))),
        }
    }
}

/// Navigation events driving [`View::transition`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Navigation {
    OpenAddAccount,
    OpenDeposit { account: String },
    OpenWithdraw { account: String },
    OpenTransfer { account: String },
    GoBack,
    /// Emitted by the controller once a command settles
    CommandFinished,
}

impl Navigation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAddAccount => "open_add_account",
            Self::OpenDeposit { .. } => "open_deposit",
            Self::OpenWithdraw { .. } => "open_withdraw",
            Self::OpenTransfer { .. } => "open_transfer",
            Self::GoBack => "go_back",
            Self::CommandFinished => "command_finished",
        }
    }
}
