//! Fund sweeps: move detected deposits to the custodial address.
//!
//! A sweep claims the record (`Detected` to `Settling`), builds and signs a
//! transfer of the observed balance minus a fee reserve, and broadcasts it.
//! Any failure after the claim returns the record to `Detected`, so no
//! deposit is ever stranded in `Settling` by a transient error.

use std::sync::Arc;

use tollgate_chain::ChainClient;
use tollgate_core::{Address, PaymentStatus, TxHash, Wei};
use tollgate_crypto::{KeyPair, TransferTransaction};
use tracing::{error, info, warn};

use crate::error::{LedgerError, SweepError};
use crate::events::{EventBus, PaymentEvent};
use crate::ledger::PaymentLedger;

/// Sweep parameters, fixed at startup from configuration.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Destination for swept funds.
    pub custodial_address: Address,
    /// Gas price for sweep transactions.
    pub gas_price: Wei,
    /// Gas limit for a plain value transfer.
    pub gas_limit: u64,
    /// Chain id baked into every sweep signature.
    pub chain_id: u64,
}

/// Outcome of a successful sweep.
#[derive(Debug, Clone)]
pub struct SweepReceipt {
    pub address: Address,
    pub tx_hash: TxHash,
    /// Amount forwarded to the custodial address.
    pub net_amount: Wei,
    /// Amount left behind to cover gas.
    pub fee_reserve: Wei,
}

pub struct SweepEngine {
    ledger: Arc<PaymentLedger>,
    chain: Arc<dyn ChainClient>,
    config: SweepConfig,
    events: EventBus,
}

impl SweepEngine {
    pub fn new(
        ledger: Arc<PaymentLedger>,
        chain: Arc<dyn ChainClient>,
        config: SweepConfig,
        events: EventBus,
    ) -> Self {
        Self {
            ledger,
            chain,
            config,
            events,
        }
    }

    /// Sweeps a detected deposit to the custodial address.
    ///
    /// Uses the balance already recorded on the ledger. The record must be
    /// `Detected`; exactly one concurrent caller gets past the claim.
    pub async fn sweep(&self, address: Address) -> Result<SweepReceipt, SweepError> {
        let record = self
            .ledger
            .begin_settling(address)
            .map_err(|e| guard_error(address, e))?;
        let balance = record.observed_balance;

        let nonce = match self.chain.transaction_count(address).await {
            Ok(nonce) => nonce,
            Err(e) => {
                warn!(address = %address, error = %e, "nonce query failed");
                self.revert(address);
                return Err(e.into());
            }
        };

        let Some(fee_reserve) = self.config.gas_price.checked_mul(self.config.gas_limit as u128)
        else {
            self.revert(address);
            return Err(SweepError::FeeOverflow {
                gas_limit: self.config.gas_limit,
                gas_price: self.config.gas_price,
            });
        };
        let net_amount = match balance.checked_sub(fee_reserve) {
            Some(net) if !net.is_zero() => net,
            _ => {
                warn!(
                    address = %address,
                    balance = %balance,
                    fee_reserve = %fee_reserve,
                    "balance cannot cover fee reserve, sweep deferred"
                );
                self.revert(address);
                return Err(SweepError::InsufficientFunds {
                    balance,
                    fee_reserve,
                });
            }
        };

        let transfer = TransferTransaction {
            nonce,
            gas_price: self.config.gas_price,
            gas_limit: self.config.gas_limit,
            to: self.config.custodial_address,
            value: net_amount,
            chain_id: self.config.chain_id,
        };

        let keypair = match record.signing_key.as_ref().map(KeyPair::from_key_material) {
            Some(Ok(keypair)) => keypair,
            Some(Err(_)) | None => {
                error!(
                    address = %address,
                    "signing key missing or unusable, manual intervention required"
                );
                self.revert(address);
                return Err(SweepError::KeyUnrecoverable(address));
            }
        };
        let signed = match transfer.sign(&keypair) {
            Ok(signed) => signed,
            Err(e) => {
                self.revert(address);
                return Err(SweepError::SignTransactionFailed(e.to_string()));
            }
        };

        match self.chain.send_raw_transaction(&signed.raw).await {
            Ok(tx_hash) => {
                self.ledger.complete_sweep(address, tx_hash)?;
                self.events.emit(PaymentEvent::Swept {
                    address,
                    tx_hash,
                    net_amount,
                });
                info!(
                    address = %address,
                    tx = %tx_hash,
                    net_amount = %net_amount,
                    fee_reserve = %fee_reserve,
                    "sweep transaction accepted"
                );
                Ok(SweepReceipt {
                    address,
                    tx_hash,
                    net_amount,
                    fee_reserve,
                })
            }
            Err(e) => {
                warn!(address = %address, error = %e, "sweep broadcast rejected");
                self.revert(address);
                Err(SweepError::BroadcastFailed(e.to_string()))
            }
        }
    }

    /// Operator-driven retry: re-reads the live balance first, so a deposit
    /// that was topped up after a failed attempt sweeps at its real value.
    pub async fn sweep_with_fresh_balance(
        &self,
        address: Address,
    ) -> Result<SweepReceipt, SweepError> {
        let balance = self.chain.balance(address).await?;
        self.ledger
            .set_observed_balance(address, balance)
            .map_err(|e| guard_error(address, e))?;
        self.sweep(address).await
    }

    fn revert(&self, address: Address) {
        if let Err(e) = self.ledger.revert_to_detected(address) {
            error!(address = %address, error = %e, "failed to return record to detected");
        }
    }
}

fn guard_error(address: Address, err: LedgerError) -> SweepError {
    match err {
        LedgerError::NotFound(a) => SweepError::NotFound(a),
        LedgerError::WrongStatus {
            status: PaymentStatus::Settling,
            ..
        } => SweepError::AlreadySettling(address),
        LedgerError::WrongStatus { status, .. } => SweepError::NotSweepable { address, status },
        other => SweepError::Ledger(other),
    }
}
