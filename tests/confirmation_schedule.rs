//! Polling cadence of the confirmation engine, checked on tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use bank_console::app::{ConfirmationConfig, ConfirmationEngine, PendingTransaction};
use bank_console::domain::{AppError, BlockchainError};
use bank_console::test_utils::MockChain;

fn engine(chain: &Arc<MockChain>) -> ConfirmationEngine {
    ConfirmationEngine::new(Arc::clone(chain) as _, ConfirmationConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_fast_then_slow_cadence_until_deadline() {
    let chain = Arc::new(MockChain::default());
    chain.set_never_confirm(true);
    let engine = engine(&chain);
    let (_cancel_tx, mut cancel) = watch::channel(false);

    let start = Instant::now();
    let pending = PendingTransaction::new("DEADBEEF");
    let result = engine.confirm(&pending, &mut cancel).await;

    match result {
        Err(AppError::Blockchain(BlockchainError::ConfirmationTimeout { tx_hash })) => {
            assert_eq!(tx_hash, "DEADBEEF");
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(start.elapsed(), Duration::from_secs(3_600));

    let offsets: Vec<Duration> = chain.lookups().iter().map(|t| *t - start).collect();
    assert_eq!(offsets[0], Duration::ZERO);
    for pair in offsets.windows(2) {
        let expected = if pair[0] < Duration::from_secs(60) {
            Duration::from_millis(500)
        } else {
            Duration::from_secs(10)
        };
        assert_eq!(pair[1] - pair[0], expected, "gap after {:?}", pair[0]);
    }

    // No lookup at or past the deadline
    let last = *offsets.last().unwrap();
    assert!(last < Duration::from_secs(3_600));
    assert_eq!(last, Duration::from_secs(3_590));
}

#[tokio::test(start_paused = true)]
async fn test_confirms_once_transaction_is_indexed() {
    let chain = Arc::new(MockChain::default());
    chain.set_polls_before_visible(3);
    let tx_hash = chain.execute(&[]);
    let engine = engine(&chain);
    let (_cancel_tx, mut cancel) = watch::channel(false);

    let start = Instant::now();
    let tx = engine
        .confirm(&PendingTransaction::new(tx_hash.clone()), &mut cancel)
        .await
        .unwrap();

    assert_eq!(tx.txhash, tx_hash);
    assert_eq!(chain.lookups().len(), 4);
    assert_eq!(start.elapsed(), Duration::from_millis(1_500));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_wait() {
    let chain = Arc::new(MockChain::default());
    chain.set_never_confirm(true);
    let engine = engine(&chain);
    let (cancel_tx, mut cancel) = watch::channel(false);

    let start = Instant::now();
    let handle = tokio::spawn(async move {
        let pending = PendingTransaction::new("CAFE");
        engine.confirm(&pending, &mut cancel).await
    });

    tokio::time::sleep(Duration::from_secs(120)).await;
    cancel_tx.send(true).unwrap();
    let result = handle.await.unwrap();

    assert!(matches!(
        result,
        Err(AppError::Blockchain(BlockchainError::Cancelled(ref h))) if h == "CAFE"
    ));
    let polled_until = chain.lookups().last().map(|t| *t - start).unwrap();
    assert!(polled_until <= Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn test_custom_schedule_is_honoured() {
    let chain = Arc::new(MockChain::default());
    chain.set_never_confirm(true);
    let config = ConfirmationConfig {
        fast_interval: Duration::from_secs(1),
        fast_window: Duration::from_secs(3),
        slow_interval: Duration::from_secs(4),
        deadline: Duration::from_secs(9),
    };
    let engine = ConfirmationEngine::new(Arc::clone(&chain) as _, config);
    let (_cancel_tx, mut cancel) = watch::channel(false);

    let start = Instant::now();
    let result = engine
        .confirm(&PendingTransaction::new("F00D"), &mut cancel)
        .await;
    assert!(result.unwrap_err().timed_out_tx_hash().is_some());

    let offsets: Vec<u64> = chain
        .lookups()
        .iter()
        .map(|t| (*t - start).as_secs())
        .collect();
    // 0,1,2 fast; 3 is past the window so the next gap is 4s; 7 + 4 is clamped to 9
    assert_eq!(offsets, vec![0, 1, 2, 3, 7]);
    assert_eq!(start.elapsed(), Duration::from_secs(9));
}
