//! Balance polling scheduler.
//!
//! Every tick takes a snapshot of pollable addresses and queries each one
//! concurrently. An in-flight set keeps overlapping passes (a slow tick, or
//! an operator-triggered scan) from querying the same address twice at once;
//! the ledger's test-and-set keeps detection exactly-once even if they did.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashSet;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tollgate_chain::ChainClient;
use tollgate_core::Address;
use tracing::{debug, info, warn};

use crate::events::{EventBus, PaymentEvent};
use crate::ledger::{PaymentLedger, PollOutcome};
use crate::notify::{NotificationDispatcher, PaymentNotice};
use crate::sweep::SweepEngine;

/// Counts from one scan pass.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ScanSummary {
    /// Addresses whose balance was queried this pass.
    pub checked: usize,
    /// Deposits detected this pass.
    pub detected: usize,
    /// Addresses whose processing failed and will be retried next tick.
    pub errors: usize,
}

enum Checked {
    NoChange,
    Detected,
    Failed,
}

pub struct PollingScheduler {
    ledger: Arc<PaymentLedger>,
    chain: Arc<dyn ChainClient>,
    sweeper: Arc<SweepEngine>,
    notifier: Arc<dyn NotificationDispatcher>,
    events: EventBus,
    interval: Duration,
    in_flight: DashSet<Address>,
    shutdown_tx: watch::Sender<bool>,
}

impl PollingScheduler {
    pub fn new(
        ledger: Arc<PaymentLedger>,
        chain: Arc<dyn ChainClient>,
        sweeper: Arc<SweepEngine>,
        notifier: Arc<dyn NotificationDispatcher>,
        events: EventBus,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            chain,
            sweeper,
            notifier,
            events,
            interval,
            in_flight: DashSet::new(),
            shutdown_tx: watch::channel(false).0,
        }
    }

    /// Runs scan passes until [`stop`](Self::stop) is called. Each pass is
    /// spawned, so a pass that outlives the interval never delays the next
    /// tick; the in-flight set keeps slow addresses from being queried twice.
    pub async fn run(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow() {
            return;
        }
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "polling scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let scheduler = Arc::clone(&self);
                    tokio::spawn(async move {
                        let summary = scheduler.scan_once().await;
                        if summary.checked > 0 {
                            debug!(
                                checked = summary.checked,
                                detected = summary.detected,
                                errors = summary.errors,
                                "scan pass complete"
                            );
                        }
                    });
                }
                _ = shutdown_rx.changed() => {
                    info!("polling scheduler stopped");
                    break;
                }
            }
        }
    }

    /// Ends the run loop. Passes already in flight complete on their own.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// One scan pass over every pollable address. Also the entry point for
    /// operator-triggered scans.
    pub async fn scan_once(&self) -> ScanSummary {
        let now = Utc::now();
        let mut work = Vec::new();
        for address in self.ledger.pollable(now) {
            if !self.in_flight.insert(address) {
                continue;
            }
            work.push(self.check_address(address));
        }

        let results = join_all(work).await;
        let mut summary = ScanSummary {
            checked: results.len(),
            ..ScanSummary::default()
        };
        for result in results {
            match result {
                Checked::Detected => summary.detected += 1,
                Checked::Failed => summary.errors += 1,
                Checked::NoChange => {}
            }
        }
        summary
    }

    async fn check_address(&self, address: Address) -> Checked {
        let result = self.poll_address(address).await;
        self.in_flight.remove(&address);
        result
    }

    async fn poll_address(&self, address: Address) -> Checked {
        let balance = match self.chain.balance(address).await {
            Ok(balance) => balance,
            Err(e) => {
                // An unreachable node is never treated as a zero balance;
                // the address is simply retried next tick.
                warn!(address = %address, error = %e, "balance query failed");
                return Checked::Failed;
            }
        };

        let record = match self.ledger.record_poll(address, balance, Utc::now()) {
            Ok(PollOutcome::Detected(record)) => record,
            Ok(_) => return Checked::NoChange,
            Err(e) => {
                warn!(address = %address, error = %e, "recording balance observation failed");
                return Checked::Failed;
            }
        };

        self.events.emit(PaymentEvent::Confirmed {
            address,
            balance: record.observed_balance,
        });

        let notice = PaymentNotice {
            address,
            expected_amount: record.expected_amount,
            observed_balance: record.observed_balance,
            detected_at: Utc::now(),
            expires_at: record.expires_at,
        };
        if let Err(e) = self.notifier.dispatch(&notice).await {
            // Best-effort: never replayed, never blocks the sweep.
            warn!(address = %address, error = %e, "detection notice delivery failed");
        }

        if let Err(e) = self.sweeper.sweep(address).await {
            debug!(address = %address, error = %e, "sweep did not complete");
        }
        Checked::Detected
    }
}
