//! Integration test: the full payment lifecycle across crates.
//!
//! Issuance through tollgate-engine, detection against the scripted chain,
//! notification, and the sweep to the custodial address.

use chrono::Utc;
use tollgate_core::{PaymentStatus, Wei};
use tollgate_engine::{CheckOutcome, RecordStore, SweepError};
use tollgate_integration_tests::{Harness, FEE_RESERVE};

// 0.05 native units in wei; comfortably above the fee reserve.
const DEPOSIT: u128 = 50_000_000_000_000_000;

// =========================================================================
// Happy path: issue → poll → detect → notify → sweep
// =========================================================================

#[tokio::test]
async fn test_full_payment_lifecycle() {
    let h = Harness::new();

    // Merchant requests an address for an expected amount.
    let issued = h.issuer.issue(Wei::new(DEPOSIT)).unwrap();
    assert_eq!(
        h.ledger.check(issued.address, Utc::now()),
        CheckOutcome::Pending
    );

    // First scan: nothing on chain yet.
    let summary = h.scheduler.scan_once().await;
    assert_eq!(summary.checked, 1);
    assert_eq!(summary.detected, 0);
    assert_eq!(h.receiver.count(), 0);

    // The payer sends funds; the next scan detects and sweeps in one pass.
    h.chain.set_balance(issued.address, Wei::new(DEPOSIT));
    let summary = h.scheduler.scan_once().await;
    assert_eq!(summary.detected, 1);

    let record = h.ledger.get(issued.address).unwrap();
    assert_eq!(record.status, PaymentStatus::Swept);
    assert!(record.invoice_sent);
    assert!(record.sweep_tx.is_some());
    assert!(record.signing_key.is_none());

    // Exactly one notice, carrying the observed deposit.
    assert_eq!(h.receiver.count(), 1);
    let notice = h.receiver.last_notice.lock().unwrap().clone().unwrap();
    assert_eq!(notice.address, issued.address);
    assert_eq!(notice.observed_balance, Wei::new(DEPOSIT));

    // Exactly one broadcast.
    assert_eq!(h.chain.broadcast_count(), 1);

    // The public check still reports the confirmed balance.
    assert_eq!(
        h.ledger.check(issued.address, Utc::now()),
        CheckOutcome::Confirmed {
            balance: Wei::new(DEPOSIT)
        }
    );
}

#[tokio::test]
async fn test_net_amount_is_balance_minus_fee_reserve() {
    let h = Harness::new();
    let issued = h.issuer.issue(Wei::new(DEPOSIT)).unwrap();
    h.chain.set_balance(issued.address, Wei::new(DEPOSIT));
    let mut rx = h.events.subscribe();

    h.scheduler.scan_once().await;

    // Confirmed first, then Swept with the fee-adjusted amount.
    let confirmed = rx.recv().await.unwrap();
    assert!(matches!(
        confirmed,
        tollgate_engine::PaymentEvent::Confirmed { .. }
    ));
    match rx.recv().await.unwrap() {
        tollgate_engine::PaymentEvent::Swept { net_amount, .. } => {
            assert_eq!(net_amount, Wei::new(DEPOSIT - FEE_RESERVE));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

// =========================================================================
// Fee-starved deposits
// =========================================================================

#[tokio::test]
async fn test_deposit_below_fee_reserve_stays_detected() {
    let h = Harness::new();
    let issued = h.issuer.issue(Wei::new(DEPOSIT)).unwrap();
    // Positive, but below `gas_limit * gas_price`.
    h.chain.set_balance(issued.address, Wei::new(FEE_RESERVE - 1));

    let summary = h.scheduler.scan_once().await;

    // Detection and notification happen; the sweep defers.
    assert_eq!(summary.detected, 1);
    assert_eq!(h.receiver.count(), 1);
    assert_eq!(h.chain.broadcast_count(), 0);
    assert_eq!(
        h.ledger.get(issued.address).unwrap().status,
        PaymentStatus::Detected
    );
}

#[tokio::test]
async fn test_operator_retry_after_top_up() {
    let h = Harness::new();
    let issued = h.issuer.issue(Wei::new(DEPOSIT)).unwrap();
    h.chain.set_balance(issued.address, Wei::new(FEE_RESERVE));

    // Balance exactly equal to the reserve nets zero: insufficient.
    h.scheduler.scan_once().await;
    assert_eq!(
        h.ledger.get(issued.address).unwrap().status,
        PaymentStatus::Detected
    );

    // The payer tops up; the operator retries with a fresh balance read.
    h.chain.set_balance(issued.address, Wei::new(DEPOSIT));
    let receipt = h
        .sweeper
        .sweep_with_fresh_balance(issued.address)
        .await
        .unwrap();

    assert_eq!(receipt.net_amount, Wei::new(DEPOSIT - FEE_RESERVE));
    assert_eq!(
        h.ledger.get(issued.address).unwrap().status,
        PaymentStatus::Swept
    );
}

// =========================================================================
// Failure isolation and retries
// =========================================================================

#[tokio::test]
async fn test_node_outage_for_one_address_spares_the_rest() {
    let h = Harness::new();
    let healthy = h.issuer.issue(Wei::new(DEPOSIT)).unwrap();
    let failing = h.issuer.issue(Wei::new(DEPOSIT)).unwrap();
    h.chain.set_balance(healthy.address, Wei::new(DEPOSIT));
    h.chain.set_balance(failing.address, Wei::new(DEPOSIT));
    h.chain.fail_balance_queries_for(failing.address);

    let summary = h.scheduler.scan_once().await;

    assert_eq!(summary.checked, 2);
    assert_eq!(summary.detected, 1);
    assert_eq!(summary.errors, 1);
    assert_eq!(
        h.ledger.get(healthy.address).unwrap().status,
        PaymentStatus::Swept
    );
    // An unreachable node is not a zero balance: the record stays Active.
    let untouched = h.ledger.get(failing.address).unwrap();
    assert_eq!(untouched.status, PaymentStatus::Active);
    assert!(!untouched.invoice_sent);

    // The node recovers and the next tick picks the deposit up.
    h.chain.restore_balance_queries_for(failing.address);
    let retry = h.scheduler.scan_once().await;
    assert_eq!(retry.detected, 1);
    assert_eq!(
        h.ledger.get(failing.address).unwrap().status,
        PaymentStatus::Swept
    );
}

#[tokio::test]
async fn test_broadcast_failure_then_successful_retry() {
    let h = Harness::new();
    let issued = h.issuer.issue(Wei::new(DEPOSIT)).unwrap();
    h.chain.set_balance(issued.address, Wei::new(DEPOSIT));
    h.chain.fail_broadcasts(true);

    h.scheduler.scan_once().await;

    // Detection stood; the failed sweep fell back to Detected with the
    // signing key intact.
    let record = h.ledger.get(issued.address).unwrap();
    assert_eq!(record.status, PaymentStatus::Detected);
    assert!(record.signing_key.is_some());
    assert_eq!(h.receiver.count(), 1);

    h.chain.fail_broadcasts(false);
    h.chain.set_nonce(1);
    let receipt = h.sweeper.sweep(issued.address).await.unwrap();
    assert_eq!(
        h.ledger.get(issued.address).unwrap().sweep_tx,
        Some(receipt.tx_hash)
    );
    // Still only the one notice from the original detection.
    assert_eq!(h.receiver.count(), 1);
}

// =========================================================================
// Expiry
// =========================================================================

#[tokio::test]
async fn test_expired_address_is_never_detected() {
    let h = Harness::new();
    let issued = h.issuer.issue(Wei::new(DEPOSIT)).unwrap();
    h.chain.set_balance(issued.address, Wei::new(DEPOSIT));

    let after_window = issued.expires_at + chrono::Duration::seconds(1);

    // The public check reports expiry regardless of the on-chain balance.
    assert_eq!(
        h.ledger.check(issued.address, after_window),
        CheckOutcome::Expired
    );
    // And the scheduler no longer polls it.
    assert!(h.ledger.pollable(after_window).is_empty());

    // An operator sweep attempt on the untouched record is refused: the
    // deposit was never detected.
    let result = h.sweeper.sweep(issued.address).await;
    assert!(matches!(result, Err(SweepError::NotSweepable { .. })));
}

#[tokio::test]
async fn test_issue_rejects_zero_and_leaves_no_trace() {
    let h = Harness::new();

    let result = h.issuer.issue(Wei::ZERO);

    assert!(result.is_err());
    assert!(h.ledger.is_empty());
    assert!(h.store.load_all().unwrap().is_empty());
}
