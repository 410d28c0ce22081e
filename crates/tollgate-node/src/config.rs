//! Node configuration loading and management.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tollgate_core::{Address, DEFAULT_PAYMENT_WINDOW_SECS};

/// Full configuration for the Tollgate node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TollgateConfig {
    /// Chain node access settings.
    #[serde(default)]
    pub chain: ChainConfig,

    /// Sweep transaction settings.
    #[serde(default)]
    pub sweep: SweepSettings,

    /// Payment window and polling cadence.
    #[serde(default)]
    pub payments: PaymentsConfig,

    /// HTTP API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Webhook notification settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the chain node.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Chain id for replay-protected signing. Discovered from the node
    /// at startup when absent.
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Per-request timeout in seconds, independent of the poll interval.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Custodial address that swept funds are forwarded to.
    #[serde(default)]
    pub custodial_address: String,
    /// Gas price for sweep transactions, in wei.
    #[serde(default = "default_gas_price")]
    pub gas_price: u64,
    /// Gas limit for a plain value transfer.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Seconds between balance scan passes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds an issued address stays monitored for a deposit.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Allow-list of accepted `X-Api-Key` values.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhookConfig {
    /// Receiver for deposit-detection notices. No webhook is sent when unset.
    #[serde(default)]
    pub url: Option<String>,
    /// Shared secret for the HMAC body signature. Unsigned when unset.
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_endpoint() -> String {
    "http://127.0.0.1:8545".into()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_gas_price() -> u64 {
    20_000_000_000
}
fn default_gas_limit() -> u64 {
    21_000
}
fn default_poll_interval_secs() -> u64 {
    10
}
fn default_window_secs() -> u64 {
    DEFAULT_PAYMENT_WINDOW_SECS
}
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    8080
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            chain_id: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            custodial_address: String::new(),
            gas_price: default_gas_price(),
            gas_limit: default_gas_limit(),
        }
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
            api_keys: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Level the subscriber should use: an explicit CLI override wins over
    /// the configured value.
    pub fn effective_level<'a>(&'a self, cli_override: Option<&'a str>) -> &'a str {
        cli_override.unwrap_or(&self.level)
    }

    /// Whether log lines should be emitted as JSON.
    pub fn json_output(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("sweep.custodial_address is required")]
    MissingCustodialAddress,

    #[error("sweep.custodial_address is not a valid address: {0}")]
    InvalidCustodialAddress(String),

    #[error("sweep.gas_limit must be positive")]
    ZeroGasLimit,

    #[error("payments.poll_interval_secs must be positive")]
    ZeroPollInterval,

    #[error("payments.window_secs must be positive")]
    ZeroWindow,

    #[error("api.api_keys must contain at least one key")]
    NoApiKeys,
}

impl TollgateConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: TollgateConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check the parts a running node cannot operate without. Returns the
    /// parsed custodial address so callers use the validated value.
    pub fn validate(&self) -> Result<Address, ConfigError> {
        if self.sweep.custodial_address.is_empty() {
            return Err(ConfigError::MissingCustodialAddress);
        }
        let custodial = self.custodial_address()?;
        if self.sweep.gas_limit == 0 {
            return Err(ConfigError::ZeroGasLimit);
        }
        if self.payments.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.payments.window_secs == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.api.api_keys.is_empty() {
            return Err(ConfigError::NoApiKeys);
        }
        Ok(custodial)
    }

    /// The configured custodial address, parsed.
    pub fn custodial_address(&self) -> Result<Address, ConfigError> {
        Address::from_str(&self.sweep.custodial_address)
            .map_err(|e| ConfigError::InvalidCustodialAddress(e.to_string()))
    }

    /// The API listen address as `host:port`.
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.listen_addr, self.api.port)
    }
}
