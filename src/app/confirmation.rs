//! Transaction confirmation polling.
//!
//! After the wallet broadcasts a transaction the engine polls the LCD for it
//! on an escalating schedule: fast while the transaction is fresh, slow after
//! that, and gives up at a hard deadline. Every failed lookup, whether
//! "not found" or anything else, counts as "not yet".

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::domain::{AppError, BlockchainError, ChainClient, TxHash, TxInfo};

/// Polling schedule for confirmations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationConfig {
    /// Interval while the transaction is younger than `fast_window`
    pub fast_interval: Duration,
    pub fast_window: Duration,
    /// Interval between `fast_window` and `deadline`
    pub slow_interval: Duration,
    /// Give up once this much time has passed since submission
    pub deadline: Duration,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            fast_interval: Duration::from_millis(500),
            fast_window: Duration::from_secs(60),
            slow_interval: Duration::from_secs(10),
            deadline: Duration::from_secs(60 * 60),
        }
    }
}

impl ConfirmationConfig {
    /// Delay before the next poll, or `None` once the deadline has passed.
    ///
    /// The delay never overshoots the deadline.
    #[must_use]
    pub fn next_delay(&self, elapsed: Duration) -> Option<Duration> {
        if elapsed >= self.deadline {
            return None;
        }
        let interval = if elapsed < self.fast_window {
            self.fast_interval
        } else {
            self.slow_interval
        };
        Some(interval.min(self.deadline - elapsed))
    }
}

/// A broadcast transaction awaiting confirmation
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub handle: TxHash,
    pub submitted_at: DateTime<Utc>,
    started: Instant,
}

impl PendingTransaction {
    #[must_use]
    pub fn new(handle: impl Into<TxHash>) -> Self {
        Self {
            handle: handle.into(),
            submitted_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Monotonic time since submission
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Polls the chain until a transaction is confirmed, times out, or is cancelled
pub struct ConfirmationEngine {
    chain_client: Arc<dyn ChainClient>,
    config: ConfirmationConfig,
}

impl ConfirmationEngine {
    #[must_use]
    pub fn new(chain_client: Arc<dyn ChainClient>, config: ConfirmationConfig) -> Self {
        Self {
            chain_client,
            config,
        }
    }

    /// Wait for `pending` to be included in a block.
    ///
    /// A confirmed transaction with a non-zero result code means the contract
    /// rejected it and is returned as `TransactionFailed`. Flipping `cancel`
    /// to `true` stops the loop before the next poll.
    #[instrument(skip(self, pending, cancel), fields(tx_hash = %pending.handle))]
    pub async fn confirm(
        &self,
        pending: &PendingTransaction,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<TxInfo, AppError> {
        let mut attempts: u32 = 0;

        loop {
            if *cancel.borrow() {
                info!(attempts = attempts, "Confirmation cancelled");
                return Err(AppError::Blockchain(BlockchainError::Cancelled(
                    pending.handle.clone(),
                )));
            }
            if pending.elapsed() >= self.config.deadline {
                return Err(self.timeout(pending, attempts));
            }

            attempts += 1;
            match self.chain_client.tx_info(&pending.handle).await {
                Ok(tx) if tx.is_success() => {
                    info!(height = %tx.height, attempts = attempts, "Transaction confirmed");
                    return Ok(tx);
                }
                Ok(tx) => {
                    warn!(
                        code = tx.code,
                        raw_log = %tx.raw_log,
                        "Transaction rejected by contract"
                    );
                    return Err(AppError::Blockchain(BlockchainError::TransactionFailed(
                        tx.raw_log,
                    )));
                }
                Err(e) => {
                    debug!(attempt = attempts, error = %e, "Transaction not yet confirmed");
                }
            }

            let Some(delay) = self.config.next_delay(pending.elapsed()) else {
                return Err(self.timeout(pending, attempts));
            };

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            let sender_dropped = tokio::select! {
                _ = &mut sleep => false,
                changed = cancel.changed() => changed.is_err(),
            };
            // Nobody can cancel any more, so keep to the schedule.
            if sender_dropped {
                sleep.await;
            }
        }
    }

    fn timeout(&self, pending: &PendingTransaction, attempts: u32) -> AppError {
        warn!(
            attempts = attempts,
            elapsed_secs = pending.elapsed().as_secs(),
            "Transaction not confirmed before deadline"
        );
        AppError::Blockchain(BlockchainError::ConfirmationTimeout {
            tx_hash: pending.handle.clone(),
        })
    }
}
