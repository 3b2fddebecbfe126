//! Configuration module for the volume bot
//!
//! This module handles all configuration loading from TOML files
//! and provides structured configuration types.

use serde::{Deserialize, Serialize};

/// Hard upper bound on the number of wallets funded per cycle.
pub const MAX_DISTRIBUTION_WALLETS: usize = 20;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoint configuration
    pub rpc: RpcConfig,

    /// Wallet and keystore configuration
    pub wallet: WalletConfig,

    /// Trading configuration
    pub trading: TradingConfig,

    /// Pacing intervals between cycle steps
    pub pacing: PacingConfig,

    /// Creator-resolution configuration
    #[serde(default)]
    pub creator: CreatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// RPC endpoint URL
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to the master keypair file
    pub keypair_path: String,

    /// Path the generated ephemeral keys are persisted to
    #[serde(default = "default_keystore_path")]
    pub keystore_path: String,

    /// Number of ephemeral wallets to fund per cycle (capped at 20)
    #[serde(default = "default_wallet_count")]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Mint of the token being cycled
    pub mint: String,

    /// Balance floor kept back from every split, in base units
    #[serde(default = "default_dust_threshold")]
    pub dust_threshold: u64,

    /// Lower bound of the first-buy percentage draw
    #[serde(default = "default_buy_lower_percent")]
    pub buy_lower_percent: u64,

    /// Upper bound of the first-buy percentage draw
    #[serde(default = "default_buy_upper_percent")]
    pub buy_upper_percent: u64,

    /// Tolerated quote movement between quoting and execution, in basis
    /// points deducted from the quoted output
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,

    /// Compute unit limit attached to trade transactions
    #[serde(default = "default_cu_limit")]
    pub compute_unit_limit: u32,

    /// Compute unit price in micro base units
    #[serde(default = "default_cu_price")]
    pub compute_unit_price: u64,

    /// Priority fee multiplier applied to the distribution transaction
    #[serde(default = "default_fee_level")]
    pub fee_level: u64,

    /// Whether buys opt into program-side volume tracking
    #[serde(default = "default_true")]
    pub track_volume: bool,

    /// Maximum attempts per submission
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed backoff between attempts, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Seconds between distribution and the first wallet starting
    #[serde(default = "default_interval_min")]
    pub distribute_interval_min_secs: u64,
    #[serde(default = "default_interval_max")]
    pub distribute_interval_max_secs: u64,

    /// Seconds between the first and second buy
    #[serde(default = "default_interval_min")]
    pub buy_interval_min_secs: u64,
    #[serde(default = "default_interval_max")]
    pub buy_interval_max_secs: u64,

    /// Seconds between the second buy and the sell
    #[serde(default = "default_interval_min")]
    pub sell_interval_min_secs: u64,
    #[serde(default = "default_interval_max")]
    pub sell_interval_max_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorConfig {
    /// Indexer endpoint for the second resolution tier. Unset disables the
    /// tier; resolution then falls through to transaction history.
    #[serde(default)]
    pub indexer_endpoint: Option<String>,

    /// Page size for the transaction-history tier
    #[serde(default = "default_signature_page_limit")]
    pub signature_page_limit: usize,
}

impl Default for CreatorConfig {
    fn default() -> Self {
        Self {
            indexer_endpoint: None,
            signature_page_limit: default_signature_page_limit(),
        }
    }
}

// Default value functions
fn default_rpc_timeout() -> u64 { 30 }
fn default_keystore_path() -> String { "wallets.json".to_string() }
fn default_wallet_count() -> usize { 8 }
fn default_dust_threshold() -> u64 { 5_000_000 }
fn default_buy_lower_percent() -> u64 { 30 }
fn default_buy_upper_percent() -> u64 { 70 }
fn default_slippage_bps() -> u16 { 5_000 }
fn default_cu_limit() -> u32 { 100_000 }
fn default_cu_price() -> u64 { 100_000 }
fn default_fee_level() -> u64 { 1 }
fn default_true() -> bool { true }
fn default_max_attempts() -> u32 { 5 }
fn default_retry_backoff_ms() -> u64 { 1_000 }
fn default_interval_min() -> u64 { 10 }
fn default_interval_max() -> u64 { 60 }
fn default_signature_page_limit() -> usize { 1_000 }

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a valid cycle.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.wallet.count == 0 {
            anyhow::bail!("wallet.count must be at least 1");
        }
        if self.trading.buy_lower_percent > self.trading.buy_upper_percent {
            anyhow::bail!(
                "buy_lower_percent {} exceeds buy_upper_percent {}",
                self.trading.buy_lower_percent,
                self.trading.buy_upper_percent
            );
        }
        if self.trading.buy_upper_percent > 100 {
            anyhow::bail!(
                "buy_upper_percent {} exceeds 100",
                self.trading.buy_upper_percent
            );
        }
        if self.trading.slippage_bps >= 10_000 {
            anyhow::bail!(
                "slippage_bps {} would floor every quote to zero",
                self.trading.slippage_bps
            );
        }
        if self.trading.max_attempts == 0 {
            anyhow::bail!("max_attempts must be at least 1");
        }
        for (name, min, max) in [
            (
                "distribute",
                self.pacing.distribute_interval_min_secs,
                self.pacing.distribute_interval_max_secs,
            ),
            (
                "buy",
                self.pacing.buy_interval_min_secs,
                self.pacing.buy_interval_max_secs,
            ),
            (
                "sell",
                self.pacing.sell_interval_min_secs,
                self.pacing.sell_interval_max_secs,
            ),
        ] {
            if min > max {
                anyhow::bail!("{name} interval min {min} exceeds max {max}");
            }
        }
        Ok(())
    }

    /// Effective wallet count after the distribution cap.
    pub fn effective_wallet_count(&self) -> usize {
        self.wallet.count.min(MAX_DISTRIBUTION_WALLETS)
    }
}
