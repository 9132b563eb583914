//! The single owner of session state.
//!
//! Handlers never touch state directly: they call the controller, which
//! replaces the `Session` as a whole after every step. The lock is never held
//! across an await, so readers always see the last complete snapshot while a
//! command or prefetch is in flight. Prefetches run on their own task and
//! land even if the request that started them is dropped.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::domain::fee::{self, FeeEstimate};
use crate::domain::{
    AppError, Amount, BankCommand, CommandKind, Navigation, Notification, ValidationError, View,
    Wallet, WalletConnection, WalletError,
};

use super::prefetch::PrefetchAggregator;
use super::service::BankService;
use super::state::Session;

/// A command as entered on the active view.
///
/// The account it applies to comes from the view, not from the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandRequest {
    CreateAccount { name: String },
    Deposit { amount: Amount },
    Withdraw { amount: Amount },
    Transfer { amount: Amount, to: String },
}

impl CommandRequest {
    /// Bind the request to the account of the active view
    pub fn resolve(self, view: &View) -> Result<BankCommand, ValidationError> {
        match (self, view) {
            (Self::CreateAccount { name }, View::AddAccount) => {
                Ok(BankCommand::CreateAccount { name })
            }
            (Self::Deposit { amount }, View::Deposit { account }) => Ok(BankCommand::Deposit {
                amount,
                account: account.clone(),
            }),
            (Self::Withdraw { amount }, View::Withdraw { account }) => Ok(BankCommand::Withdraw {
                amount,
                account: account.clone(),
            }),
            (Self::Transfer { amount, to }, View::Transfer { account }) => {
                Ok(BankCommand::Transfer {
                    amount,
                    from: account.clone(),
                    to,
                })
            }
            (request, view) => Err(ValidationError::InvalidTransition(format!(
                "{} cannot be submitted from the {} view",
                request.name(),
                view.name()
            ))),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::CreateAccount { .. } => "create_account",
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::Transfer { .. } => "transfer",
        }
    }
}

/// Notification raised when a command of `kind` fails.
///
/// Causes are not told apart, except that a timed-out confirmation carries
/// the hash so the user can look the transaction up.
#[must_use]
pub fn failure_notification(kind: CommandKind, error: &AppError) -> Notification {
    let (title, message) = match kind {
        CommandKind::CreateAccount => ("Account already exists", "Please use another name"),
        CommandKind::Deposit => ("Deposit Error", "Insufficient balance"),
        CommandKind::Withdraw => ("Withdraw Error", "Insufficient balance"),
        CommandKind::Transfer => ("Transfer Error", "Please check To account or balance"),
    };

    match error.timed_out_tx_hash() {
        Some(tx_hash) => Notification::new(
            title,
            format!(
                "Transaction queued. To verify the status, please check the transaction hash: {}",
                tx_hash
            ),
        )
        .with_tx_hash(tx_hash),
        None => Notification::new(title, message),
    }
}

pub struct Controller {
    service: Arc<BankService>,
    prefetcher: PrefetchAggregator,
    wallet: Arc<dyn Wallet>,
    session: Arc<RwLock<Session>>,
    command_gate: Mutex<()>,
}

impl Controller {
    #[must_use]
    pub fn new(
        service: Arc<BankService>,
        prefetcher: PrefetchAggregator,
        wallet: Arc<dyn Wallet>,
    ) -> Self {
        Self {
            service,
            prefetcher,
            wallet,
            session: Arc::new(RwLock::new(Session::default())),
            command_gate: Mutex::new(()),
        }
    }

    /// Current snapshot
    #[must_use]
    pub fn session(&self) -> Session {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, f: impl FnOnce(&Session) -> Session) -> Session {
        replace_session(&self.session, f)
    }

    /// Read the wallet's current identity and prefetch unconditionally.
    ///
    /// Run once at startup; an unreachable wallet counts as disconnected.
    #[instrument(skip(self))]
    pub async fn sync_wallet(&self) -> Session {
        let connection = self.wallet.connection().await.unwrap_or_else(|e| {
            warn!(error = %e, "Wallet unreachable, treating as disconnected");
            WalletConnection::disconnected()
        });
        let address = connection.active_address().map(str::to_string);
        self.replace(|s| Session {
            wallet: address,
            ..s.clone()
        });
        self.refresh().await
    }

    #[instrument(skip(self))]
    pub async fn connect_wallet(&self) -> Result<Session, AppError> {
        let connection = self.wallet.connect().await?;
        Ok(self.apply_identity(&connection).await)
    }

    #[instrument(skip(self))]
    pub async fn disconnect_wallet(&self) -> Result<Session, AppError> {
        let connection = self.wallet.disconnect().await?;
        Ok(self.apply_identity(&connection).await)
    }

    /// Prefetch only when the wallet identity actually changed
    async fn apply_identity(&self, connection: &WalletConnection) -> Session {
        let address = connection.active_address().map(str::to_string);
        let current = self.session();
        if current.wallet == address {
            return current;
        }
        info!(wallet = ?address, "Wallet identity changed");
        self.replace(|s| Session {
            wallet: address,
            ..s.clone()
        });
        self.refresh().await
    }

    /// Rebuild balances for the current wallet
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Session {
        let wallet = self
            .replace(|s| Session {
                loading: true,
                ..s.clone()
            })
            .wallet;

        let prefetcher = self.prefetcher.clone();
        let session = Arc::clone(&self.session);
        let target = wallet.clone();
        let task = tokio::spawn(async move {
            let balances = prefetcher.fetch(target.as_deref()).await;
            replace_session(&session, |s| {
                // A newer identity owns the session now; its own prefetch will land.
                if s.wallet != target {
                    return s.clone();
                }
                Session {
                    balances,
                    loading: false,
                    ..s.clone()
                }
            })
        });

        match task.await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Prefetch task failed");
                self.replace(|s| Session {
                    loading: s.loading && s.wallet != wallet,
                    ..s.clone()
                })
            }
        }
    }

    /// Apply a navigation event to the active view
    pub fn navigate(&self, event: Navigation) -> Result<Session, AppError> {
        let mut outcome = Ok(());
        let session = self.replace(|s| match s.view.transition(event) {
            Ok(view) => Session { view, ..s.clone() },
            Err(e) => {
                outcome = Err(e);
                s.clone()
            }
        });
        outcome?;
        Ok(session)
    }

    /// Run a command for the active view.
    ///
    /// Whatever the outcome, the view ends on Account. A failure becomes the
    /// session notification rather than an error; errors are reserved for
    /// requests that never reached the chain.
    #[instrument(skip(self, request))]
    pub async fn submit(&self, request: CommandRequest) -> Result<Session, AppError> {
        let _gate = self
            .command_gate
            .try_lock()
            .map_err(|_| AppError::Conflict("A command is already in progress".to_string()))?;

        let current = self.session();
        let command = request.resolve(&current.view)?;
        let sender = current.wallet.ok_or(WalletError::NotConnected)?;
        let kind = command.kind();

        let outcome = match command {
            BankCommand::CreateAccount { name } => {
                self.service.create_account(&sender, &name).await
            }
            BankCommand::Deposit { amount, account } => {
                self.service.deposit(&sender, amount, &account).await
            }
            BankCommand::Withdraw { amount, account } => {
                self.service.withdraw(&sender, amount, &account).await
            }
            BankCommand::Transfer { amount, from, to } => {
                self.service.transfer(&sender, amount, &from, &to).await
            }
        };

        match outcome {
            Ok(tx) => {
                info!(command = %kind, tx_hash = %tx.txhash, "Command confirmed");
                self.refresh().await;
                Ok(self.finish_command(None))
            }
            Err(e) => {
                warn!(command = %kind, error = %e, "Command failed");
                Ok(self.finish_command(Some(failure_notification(kind, &e))))
            }
        }
    }

    fn finish_command(&self, notification: Option<Notification>) -> Session {
        self.replace(|s| Session {
            view: s
                .view
                .transition(Navigation::CommandFinished)
                .unwrap_or_default(),
            notification,
            ..s.clone()
        })
    }

    pub fn dismiss_notification(&self) -> Session {
        self.replace(|s| Session {
            notification: None,
            ..s.clone()
        })
    }

    /// Advisory fee text inputs for the transfer form
    #[must_use]
    pub fn estimate_fee(&self, amount: Option<Amount>, to: Option<&str>) -> Option<FeeEstimate> {
        let session = self.session();
        fee::estimate(amount, to, &session.balances.accounts)
    }

    /// Cancel in-flight confirmations
    pub fn shutdown(&self) {
        info!("Cancelling pending confirmations");
        self.service.cancel_pending();
    }
}

/// Replace the session with `f(current)` and return the new snapshot
fn replace_session(session: &RwLock<Session>, f: impl FnOnce(&Session) -> Session) -> Session {
    let mut guard = session.write().unwrap_or_else(PoisonError::into_inner);
    let next = f(&guard);
    *guard = next.clone();
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppState, ConfirmationConfig};
    use crate::domain::{Account, AggregatedBalances, BlockchainError, ChainClient};
    use crate::test_utils::{MOCK_WALLET_ADDRESS, MockChain, MockWallet};
    use std::time::Duration;

    fn setup() -> (Arc<Controller>, Arc<MockChain>, Arc<MockWallet>) {
        let chain = Arc::new(MockChain::default());
        let wallet = Arc::new(MockWallet::new(Arc::clone(&chain)));
        let state = AppState::new(
            Arc::clone(&chain) as Arc<dyn ChainClient>,
            Arc::clone(&wallet) as Arc<dyn Wallet>,
            chain.contracts().clone(),
            ConfirmationConfig {
                fast_interval: Duration::from_millis(1),
                fast_window: Duration::from_secs(1),
                slow_interval: Duration::from_millis(5),
                deadline: Duration::from_secs(2),
            },
        );
        (state.controller, chain, wallet)
    }

    fn open_add_account(controller: &Controller) {
        controller.navigate(Navigation::OpenAddAccount).unwrap();
    }

    async fn create_vault(controller: &Controller) -> Session {
        open_add_account(controller);
        controller
            .submit(CommandRequest::CreateAccount {
                name: "Vault".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_account_then_duplicate() {
        let (controller, _, _) = setup();
        controller.connect_wallet().await.unwrap();

        let session = create_vault(&controller).await;
        assert_eq!(session.view, View::Account);
        assert!(session.notification.is_none());
        assert_eq!(
            session.balances.accounts,
            vec![Account::new("Vault", Amount::ZERO)]
        );

        let session = create_vault(&controller).await;
        assert_eq!(session.view, View::Account);
        let notification = session.notification.unwrap();
        assert_eq!(notification.title, "Account already exists");
        assert_eq!(notification.message, "Please use another name");
        assert_eq!(session.balances.accounts.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_without_wallet_is_rejected() {
        let (controller, _, wallet) = setup();
        open_add_account(&controller);
        let err = controller
            .submit(CommandRequest::CreateAccount {
                name: "Vault".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Wallet(WalletError::NotConnected)));
        assert!(wallet.posted().is_empty());
        assert_eq!(controller.session().view, View::AddAccount);
    }

    #[tokio::test]
    async fn test_second_command_while_busy_conflicts() {
        let (controller, _, _) = setup();
        controller.connect_wallet().await.unwrap();
        open_add_account(&controller);

        let _held = controller.command_gate.try_lock().unwrap();
        let err = controller
            .submit(CommandRequest::CreateAccount {
                name: "Vault".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_wallet_rejection_becomes_notification() {
        let (controller, chain, wallet) = setup();
        chain.seed_account(MOCK_WALLET_ADDRESS, "Savings", 10);
        chain.set_token_balance(MOCK_WALLET_ADDRESS, 10);
        controller.connect_wallet().await.unwrap();
        wallet.set_reject_posts(true);

        controller
            .navigate(Navigation::OpenDeposit {
                account: "Savings".to_string(),
            })
            .unwrap();
        let session = controller
            .submit(CommandRequest::Deposit {
                amount: Amount::new(5),
            })
            .await
            .unwrap();
        assert_eq!(session.view, View::Account);
        assert_eq!(session.notification.unwrap().title, "Deposit Error");
        assert_eq!(chain.account_balance("Savings"), Some(10));
    }

    #[tokio::test]
    async fn test_connect_prefetches_and_disconnect_clears() {
        let (controller, chain, _) = setup();
        chain.seed_account(MOCK_WALLET_ADDRESS, "Savings", 42);
        chain.set_token_balance(MOCK_WALLET_ADDRESS, 7);

        let session = controller.sync_wallet().await;
        assert!(session.wallet.is_none());
        assert!(session.balances.accounts.is_empty());

        let session = controller.connect_wallet().await.unwrap();
        assert_eq!(session.wallet.as_deref(), Some(MOCK_WALLET_ADDRESS));
        assert_eq!(
            session.balances.accounts,
            vec![Account::new("Savings", Amount::new(42))]
        );
        assert_eq!(session.balances.token_balance, Amount::new(7));
        assert!(!session.loading);

        let session = controller.disconnect_wallet().await.unwrap();
        assert!(session.wallet.is_none());
        assert_eq!(session.balances, AggregatedBalances::empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_prefetch_is_discarded_after_identity_change() {
        let (controller, chain, _) = setup();
        chain.seed_account(MOCK_WALLET_ADDRESS, "Savings", 42);
        chain.set_query_delay(Duration::from_secs(10));

        let connecting = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.connect_wallet().await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(controller.session().loading);

        let session = controller.disconnect_wallet().await.unwrap();
        assert!(session.wallet.is_none());
        assert!(!session.loading);

        let late = connecting.await.unwrap().unwrap();
        assert!(late.wallet.is_none());
        assert!(late.balances.accounts.is_empty());
        assert!(!late.loading);
        assert_eq!(controller.session(), session);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_refresh_still_lands() {
        let (controller, chain, wallet) = setup();
        chain.seed_account(MOCK_WALLET_ADDRESS, "Savings", 42);
        wallet.connect().await.unwrap();
        controller.sync_wallet().await;
        chain.set_token_balance(MOCK_WALLET_ADDRESS, 9);
        chain.set_query_delay(Duration::from_secs(40));

        let dropped = tokio::time::timeout(Duration::from_secs(5), controller.refresh()).await;
        assert!(dropped.is_err());
        assert!(controller.session().loading);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let session = controller.session();
        assert!(!session.loading);
        assert_eq!(session.balances.token_balance, Amount::new(9));
        assert_eq!(
            session.balances.accounts,
            vec![Account::new("Savings", Amount::new(42))]
        );
    }

    #[tokio::test]
    async fn test_unreachable_wallet_starts_disconnected() {
        let (controller, _, wallet) = setup();
        wallet.set_unavailable(true);
        let session = controller.sync_wallet().await;
        assert!(session.wallet.is_none());
        assert!(!session.loading);
    }

    #[test]
    fn test_invalid_navigation_leaves_session_unchanged() {
        let (controller, _, _) = setup();
        controller.navigate(Navigation::OpenAddAccount).unwrap();
        let err = controller
            .navigate(Navigation::OpenWithdraw {
                account: "Savings".to_string(),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::InvalidTransition(_))
        ));
        assert_eq!(controller.session().view, View::AddAccount);

        let session = controller.navigate(Navigation::GoBack).unwrap();
        assert_eq!(session.view, View::Account);
    }

    #[tokio::test]
    async fn test_fee_estimate_uses_own_accounts() {
        let (controller, chain, _) = setup();
        chain.seed_account(MOCK_WALLET_ADDRESS, "Savings", 42);
        controller.connect_wallet().await.unwrap();

        assert_eq!(
            controller.estimate_fee(Some(Amount::new(250)), Some("Savings")),
            Some(FeeEstimate::NoFee)
        );
        assert_eq!(
            controller.estimate_fee(Some(Amount::new(250)), Some("Alice")),
            Some(FeeEstimate::Charged {
                fee: Amount::new(2),
                receive: Amount::new(248),
            })
        );
        assert_eq!(controller.estimate_fee(None, Some("Alice")), None);
    }

    #[test]
    fn test_dismiss_notification() {
        let (controller, _, _) = setup();
        controller.replace(|s| Session {
            notification: Some(Notification::new("t", "m")),
            ..s.clone()
        });
        assert!(controller.dismiss_notification().notification.is_none());
    }

    #[test]
    fn test_resolve_binds_view_account() {
        let view = View::Transfer {
            account: "Savings".to_string(),
        };
        let cmd = CommandRequest::Transfer {
            amount: Amount::new(10),
            to: "Alice".to_string(),
        }
        .resolve(&view)
        .unwrap();
        assert_eq!(
            cmd,
            BankCommand::Transfer {
                amount: Amount::new(10),
                from: "Savings".to_string(),
                to: "Alice".to_string(),
            }
        );
    }

    #[test]
    fn test_resolve_rejects_mismatched_view() {
        let err = CommandRequest::Deposit {
            amount: Amount::new(1),
        }
        .resolve(&View::Account)
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTransition(_)));

        assert!(
            CommandRequest::CreateAccount {
                name: "X".to_string()
            }
            .resolve(&View::Withdraw {
                account: "X".to_string()
            })
            .is_err()
        );
    }

    #[test]
    fn test_failure_notification_texts() {
        let err = AppError::Blockchain(BlockchainError::TransactionFailed("dup".to_string()));
        let n = failure_notification(CommandKind::CreateAccount, &err);
        assert_eq!(n.title, "Account already exists");
        assert_eq!(n.message, "Please use another name");
        assert!(n.tx_hash.is_none());

        let n = failure_notification(CommandKind::Transfer, &err);
        assert_eq!(n.title, "Transfer Error");
        assert_eq!(n.message, "Please check To account or balance");
    }

    #[test]
    fn test_failure_notification_for_timeout_carries_hash() {
        let err = AppError::Blockchain(BlockchainError::ConfirmationTimeout {
            tx_hash: "FEED01".to_string(),
        });
        let n = failure_notification(CommandKind::Withdraw, &err);
        assert_eq!(n.title, "Withdraw Error");
        assert_eq!(n.tx_hash.as_deref(), Some("FEED01"));
        assert!(n.message.ends_with("FEED01"));
    }
}
