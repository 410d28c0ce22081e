//! Shared node state, accessible from HTTP handlers.

use std::collections::HashSet;
use std::sync::Arc;

use tollgate_chain::ChainClient;
use tollgate_engine::{AddressIssuer, PaymentLedger, PollingScheduler, SweepEngine};

/// Everything the HTTP handlers need, behind one `Arc`.
pub struct AppState {
    pub ledger: Arc<PaymentLedger>,
    pub issuer: Arc<AddressIssuer>,
    pub sweeper: Arc<SweepEngine>,
    pub scheduler: Arc<PollingScheduler>,
    pub chain: Arc<dyn ChainClient>,
    api_keys: HashSet<String>,
}

impl AppState {
    pub fn new(
        ledger: Arc<PaymentLedger>,
        issuer: Arc<AddressIssuer>,
        sweeper: Arc<SweepEngine>,
        scheduler: Arc<PollingScheduler>,
        chain: Arc<dyn ChainClient>,
        api_keys: Vec<String>,
    ) -> Self {
        Self {
            ledger,
            issuer,
            sweeper,
            scheduler,
            chain,
            api_keys: api_keys.into_iter().collect(),
        }
    }

    /// Whether the presented `X-Api-Key` value is on the allow-list.
    pub fn key_is_valid(&self, key: Option<&str>) -> bool {
        match key {
            Some(key) => self.api_keys.contains(key),
            None => false,
        }
    }
}
