use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use tollgate_core::{Address, TxHash, Wei};

use crate::error::ChainError;

/// Read and broadcast access to a chain node.
///
/// The engine only ever talks to the chain through this trait, so tests
/// and alternative transports can stand in for the JSON-RPC client.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current balance of the address in wei.
    async fn balance(&self, address: Address) -> Result<Wei, ChainError>;

    /// Transaction count including pending transactions; used as the next
    /// nonce for the sweep.
    async fn transaction_count(&self, address: Address) -> Result<u64, ChainError>;

    /// Broadcast a raw signed transaction. Returns the transaction hash
    /// reported by the node.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, ChainError>;

    /// Chain id used for replay-protected signing.
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Liveness probe. Returns the node's client version string.
    async fn client_version(&self) -> Result<String, ChainError>;
}

/// JSON-RPC 2.0 client over HTTP.
pub struct HttpChainClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpChainClient {
    /// Create a client for the given node endpoint. The timeout bounds
    /// every request and is deliberately independent of the scheduler's
    /// tick interval.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::ClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ChainError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        tracing::debug!(method, "chain rpc call");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::NodeUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChainError::NodeUnavailable(e.to_string()))?;

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;
        unwrap_rpc(body)
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn balance(&self, address: Address) -> Result<Wei, ChainError> {
        let quantity: String = self
            .call("eth_getBalance", json!([address.to_checksum(), "latest"]))
            .await?;
        parse_quantity_u128(&quantity).map(Wei::new)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, ChainError> {
        let quantity: String = self
            .call(
                "eth_getTransactionCount",
                json!([address.to_checksum(), "pending"]),
            )
            .await?;
        parse_quantity_u64(&quantity)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, ChainError> {
        let hash: String = self
            .call(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        hash.parse()
            .map_err(|e| ChainError::InvalidResponse(format!("bad transaction hash: {}", e)))
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        let quantity: String = self.call("eth_chainId", json!([])).await?;
        parse_quantity_u64(&quantity)
    }

    async fn client_version(&self) -> Result<String, ChainError> {
        self.call("web3_clientVersion", json!([])).await
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

fn unwrap_rpc<T>(body: RpcResponse<T>) -> Result<T, ChainError> {
    if let Some(err) = body.error {
        return Err(ChainError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    body.result
        .ok_or_else(|| ChainError::InvalidResponse("response carries neither result nor error".into()))
}

/// Parse a `0x`-prefixed hex quantity.
fn parse_quantity_u128(s: &str) -> Result<u128, ChainError> {
    let stripped = s
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::InvalidResponse(format!("quantity missing 0x prefix: {}", s)))?;
    u128::from_str_radix(stripped, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("bad hex quantity {}: {}", s, e)))
}

fn parse_quantity_u64(s: &str) -> Result<u64, ChainError> {
    let value = parse_quantity_u128(s)?;
    u64::try_from(value)
        .map_err(|_| ChainError::InvalidResponse(format!("quantity out of range: {}", s)))
}
