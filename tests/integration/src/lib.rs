//! Shared fixtures for the cross-crate flow tests: a scriptable in-process
//! chain node, a counting notification receiver, and a fully wired engine.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tollgate_chain::{ChainClient, ChainError};
use tollgate_core::{keccak256, Address, TxHash, Wei};
use tollgate_engine::{
    AddressIssuer, EventBus, MemoryStore, NotificationDispatcher, NotifyError, PaymentLedger,
    PaymentNotice, PollingScheduler, RecordStore, SweepConfig, SweepEngine,
};

pub const GAS_PRICE: u128 = 5;
pub const GAS_LIMIT: u64 = 21_000;
/// `gas_limit * gas_price` with the scenario numbers above.
pub const FEE_RESERVE: u128 = 105_000;
pub const CUSTODIAL: [u8; 20] = [0xcc; 20];

/// In-process stand-in for a chain node. Balances are scripted per address;
/// failures can be injected per concern.
pub struct ScriptedChain {
    balances: DashMap<Address, Wei>,
    nonce: AtomicU64,
    fail_balance_for: DashSet<Address>,
    fail_broadcast: AtomicBool,
    broadcasts: Mutex<Vec<Vec<u8>>>,
}

impl Default for ScriptedChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedChain {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
            nonce: AtomicU64::new(0),
            fail_balance_for: DashSet::new(),
            fail_broadcast: AtomicBool::new(false),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_balance(&self, address: Address, balance: Wei) {
        self.balances.insert(address, balance);
    }

    pub fn fail_balance_queries_for(&self, address: Address) {
        self.fail_balance_for.insert(address);
    }

    pub fn restore_balance_queries_for(&self, address: Address) {
        self.fail_balance_for.remove(&address);
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.nonce.store(nonce, Ordering::SeqCst);
    }

    pub fn fail_broadcasts(&self, fail: bool) {
        self.fail_broadcast.store(fail, Ordering::SeqCst);
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn balance(&self, address: Address) -> Result<Wei, ChainError> {
        if self.fail_balance_for.contains(&address) {
            return Err(ChainError::NodeUnavailable("connection refused".into()));
        }
        Ok(self
            .balances
            .get(&address)
            .map(|entry| *entry)
            .unwrap_or(Wei::ZERO))
    }

    async fn transaction_count(&self, _address: Address) -> Result<u64, ChainError> {
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, ChainError> {
        if self.fail_broadcast.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc {
                code: -32000,
                message: "nonce too low".into(),
            });
        }
        let hash = TxHash::new(keccak256(raw));
        self.broadcasts.lock().unwrap().push(raw.to_vec());
        Ok(hash)
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(1337)
    }

    async fn client_version(&self) -> Result<String, ChainError> {
        Ok("scripted/0.1.0".into())
    }
}

/// Counts dispatched notices and remembers the last one.
#[derive(Default)]
pub struct CountingReceiver {
    dispatched: AtomicUsize,
    pub last_notice: Mutex<Option<PaymentNotice>>,
}

impl CountingReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationDispatcher for CountingReceiver {
    async fn dispatch(&self, notice: &PaymentNotice) -> Result<(), NotifyError> {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        *self.last_notice.lock().unwrap() = Some(notice.clone());
        Ok(())
    }
}

/// A fully wired engine over a [`MemoryStore`] (or a caller-provided store,
/// to test restarts) and the scripted chain.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<PaymentLedger>,
    pub chain: Arc<ScriptedChain>,
    pub receiver: Arc<CountingReceiver>,
    pub events: EventBus,
    pub issuer: AddressIssuer,
    pub sweeper: Arc<SweepEngine>,
    pub scheduler: PollingScheduler,
}

impl Harness {
    pub fn new() -> Self {
        Self::over_store(Arc::new(MemoryStore::new()))
    }

    /// Build the engine over an existing store, as the node does at startup.
    pub fn over_store(store: Arc<MemoryStore>) -> Self {
        let ledger =
            Arc::new(PaymentLedger::open(Arc::clone(&store) as Arc<dyn RecordStore>).unwrap());
        let chain = Arc::new(ScriptedChain::new());
        let receiver = Arc::new(CountingReceiver::new());
        let events = EventBus::new(32);
        let sweeper = Arc::new(SweepEngine::new(
            Arc::clone(&ledger),
            Arc::clone(&chain) as Arc<dyn ChainClient>,
            SweepConfig {
                custodial_address: Address::new(CUSTODIAL),
                gas_price: Wei::new(GAS_PRICE),
                gas_limit: GAS_LIMIT,
                chain_id: 1337,
            },
            events.clone(),
        ));
        let issuer = AddressIssuer::new(Arc::clone(&ledger), chrono::Duration::seconds(900));
        let scheduler = PollingScheduler::new(
            Arc::clone(&ledger),
            Arc::clone(&chain) as Arc<dyn ChainClient>,
            Arc::clone(&sweeper),
            Arc::clone(&receiver) as Arc<dyn NotificationDispatcher>,
            events.clone(),
            Duration::from_secs(10),
        );
        Self {
            store,
            ledger,
            chain,
            receiver,
            events,
            issuer,
            sweeper,
            scheduler,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
