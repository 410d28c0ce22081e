//! Integration test: the store is the single source of truth.
//!
//! Every lifecycle step must be on disk before it is acknowledged, so an
//! engine rebuilt over the same store picks up exactly where the previous
//! process stopped.

use std::sync::Arc;

use chrono::Utc;
use tollgate_core::{PaymentStatus, Wei};
use tollgate_engine::CheckOutcome;
use tollgate_integration_tests::{Harness, FEE_RESERVE};

const DEPOSIT: u128 = 50_000_000_000_000_000;

#[tokio::test]
async fn test_active_records_survive_restart_and_stay_pollable() {
    let first = Harness::new();
    let issued = first.issuer.issue(Wei::new(DEPOSIT)).unwrap();
    let store = Arc::clone(&first.store);
    drop(first);

    let second = Harness::over_store(store);

    assert_eq!(second.ledger.len(), 1);
    assert_eq!(
        second.ledger.get(issued.address).unwrap().status,
        PaymentStatus::Active
    );
    assert_eq!(second.ledger.pollable(Utc::now()), vec![issued.address]);

    // The restarted engine completes the payment end to end.
    second.chain.set_balance(issued.address, Wei::new(DEPOSIT));
    let summary = second.scheduler.scan_once().await;
    assert_eq!(summary.detected, 1);
    assert_eq!(
        second.ledger.get(issued.address).unwrap().status,
        PaymentStatus::Swept
    );
}

#[tokio::test]
async fn test_detected_record_is_sweepable_after_restart() {
    let first = Harness::new();
    let issued = first.issuer.issue(Wei::new(DEPOSIT)).unwrap();
    // Dust deposit: detection persists, the sweep defers on fees.
    first
        .chain
        .set_balance(issued.address, Wei::new(FEE_RESERVE - 1));
    first.scheduler.scan_once().await;
    let notices_before = first.receiver.count();
    assert_eq!(notices_before, 1);

    let store = Arc::clone(&first.store);
    drop(first);
    let second = Harness::over_store(store);

    // The reloaded record is Detected with its signing key, so the operator
    // retry path works without re-detection.
    let record = second.ledger.get(issued.address).unwrap();
    assert_eq!(record.status, PaymentStatus::Detected);
    assert!(record.invoice_sent);
    assert!(record.signing_key.is_some());

    second.chain.set_balance(issued.address, Wei::new(DEPOSIT));
    let receipt = second
        .sweeper
        .sweep_with_fresh_balance(issued.address)
        .await
        .unwrap();
    assert_eq!(receipt.net_amount, Wei::new(DEPOSIT - FEE_RESERVE));

    // Detection never replays, so no second notice after the restart.
    assert_eq!(second.receiver.count(), 0);
}

#[tokio::test]
async fn test_swept_record_stays_terminal_and_scrubbed_after_restart() {
    let first = Harness::new();
    let issued = first.issuer.issue(Wei::new(DEPOSIT)).unwrap();
    first.chain.set_balance(issued.address, Wei::new(DEPOSIT));
    first.scheduler.scan_once().await;
    let tx_hash = first.ledger.get(issued.address).unwrap().sweep_tx.unwrap();

    let store = Arc::clone(&first.store);
    drop(first);
    let second = Harness::over_store(store);

    let record = second.ledger.get(issued.address).unwrap();
    assert_eq!(record.status, PaymentStatus::Swept);
    assert_eq!(record.sweep_tx, Some(tx_hash));
    // The key was scrubbed before the original process exited.
    assert!(record.signing_key.is_none());

    // Swept records never come back into rotation.
    assert!(second.ledger.pollable(Utc::now()).is_empty());
    second.chain.set_balance(issued.address, Wei::new(DEPOSIT));
    let summary = second.scheduler.scan_once().await;
    assert_eq!(summary.checked, 0);
    assert_eq!(second.receiver.count(), 0);
}

#[tokio::test]
async fn test_confirmed_check_outcome_survives_restart() {
    let first = Harness::new();
    let issued = first.issuer.issue(Wei::new(DEPOSIT)).unwrap();
    // Detection without sweep completion.
    first.chain.fail_broadcasts(true);
    first.chain.set_balance(issued.address, Wei::new(DEPOSIT));
    first.scheduler.scan_once().await;

    let store = Arc::clone(&first.store);
    drop(first);
    let second = Harness::over_store(store);

    assert_eq!(
        second.ledger.check(issued.address, Utc::now()),
        CheckOutcome::Confirmed {
            balance: Wei::new(DEPOSIT)
        }
    );
}
