//! Configuration types

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Market data stream
    #[serde(default)]
    pub feed: FeedConfig,
    /// Reconnect policy for the feed
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Shared-memory region
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Shadow execution
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Ledger mirroring
    #[serde(default)]
    pub balance_sync: BalanceSyncConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// Exchange stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// WebSocket URL of the top-of-book stream
    #[serde(default = "default_feed_url")]
    pub url: String,
    /// Bound on connect plus TLS and websocket handshake, in seconds
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
    /// Maximum silence while streaming before the connection is dropped, in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl FeedConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            handshake_timeout_secs: default_handshake_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

fn default_feed_url() -> String {
    "wss://stream.binance.com:443/ws/btcusdt@bookTicker".to_string()
}

fn default_handshake_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    10
}

/// Backoff flavour between reconnect attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    #[default]
    Fixed,
    Exponential,
}

/// Reconnect configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default)]
    pub strategy: BackoffStrategy,
    /// Delay between attempts (base delay for exponential) in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub delay_ms: u64,
    /// Maximum reconnection attempts (0 = infinite)
    #[serde(default)]
    pub max_attempts: u32,
    /// Cap for exponential backoff in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Growth factor for exponential backoff
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            delay_ms: default_reconnect_delay(),
            max_attempts: 0,
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_reconnect_delay() -> u64 {
    5000
}

fn default_max_delay() -> u64 {
    60_000
}

fn default_multiplier() -> f64 {
    2.0
}

/// Shared-memory region configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Region name, as passed to shm_open by the strategy
    #[serde(default = "default_channel_name")]
    pub name: String,
    /// Directory backing named regions
    #[serde(default = "default_channel_directory")]
    pub directory: String,
    /// Mapped size in bytes
    #[serde(default = "default_channel_size")]
    pub size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: default_channel_name(),
            directory: default_channel_directory(),
            size: default_channel_size(),
        }
    }
}

fn default_channel_name() -> String {
    "hydra_shm".to_string()
}

fn default_channel_directory() -> String {
    crate::channel::DEFAULT_SHM_DIR.to_string()
}

fn default_channel_size() -> usize {
    crate::channel::DEFAULT_REGION_SIZE
}

/// Shadow execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Taker fee applied to both sides, as a fraction of notional
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,
    /// Cash the virtual ledger starts with
    #[serde(default = "default_starting_cash")]
    pub starting_cash: Decimal,
    /// Command and quote polling period in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Mean simulated order latency in milliseconds
    #[serde(default = "default_latency_mean")]
    pub latency_mean_ms: f64,
    /// Standard deviation of simulated latency (0 = fixed latency)
    #[serde(default)]
    pub latency_std_dev_ms: f64,
    /// Seed for latency sampling; random when absent
    #[serde(default)]
    pub latency_seed: Option<u64>,
}

impl SimulatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            fee_rate: default_fee_rate(),
            starting_cash: default_starting_cash(),
            poll_interval_ms: default_poll_interval(),
            latency_mean_ms: default_latency_mean(),
            latency_std_dev_ms: 0.0,
            latency_seed: None,
        }
    }
}

fn default_fee_rate() -> Decimal {
    dec!(0.00075)
}

fn default_starting_cash() -> Decimal {
    dec!(10000)
}

fn default_poll_interval() -> u64 {
    10
}

fn default_latency_mean() -> f64 {
    20.0
}

/// Balance mirroring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSyncConfig {
    #[serde(default = "default_sync_period")]
    pub period_ms: u64,
}

impl BalanceSyncConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for BalanceSyncConfig {
    fn default() -> Self {
        Self {
            period_ms: default_sync_period(),
        }
    }
}

fn default_sync_period() -> u64 {
    500
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
