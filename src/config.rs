//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auction: AuctionConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub fraud: FraudConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Auction fast-path configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuctionConfig {
    /// Hard latency budget for the read/score phase; on timeout the
    /// auction fails open to no-fill with zero side effects
    #[serde(default = "default_auction_timeout_ms")]
    pub timeout_ms: u64,

    /// Bounded compare-and-set attempts per budget debit
    #[serde(default = "default_max_debit_attempts")]
    pub max_debit_attempts: u32,

    /// Advertisers below this trust score are never candidates
    #[serde(default = "default_min_trust_score")]
    pub min_trust_score: f64,

    /// Pacing factor used when a campaign has no record for today yet
    #[serde(default = "default_pacing_factor")]
    pub default_pacing_factor: f64,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_auction_timeout_ms(),
            max_debit_attempts: default_max_debit_attempts(),
            min_trust_score: default_min_trust_score(),
            default_pacing_factor: default_pacing_factor(),
        }
    }
}

/// Pacing controller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    /// Assumed cost per impression in cents, used to derive each
    /// campaign's daily impression target from its daily cap
    #[serde(default = "default_assumed_cpm_cents")]
    pub assumed_cpm_cents: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            assumed_cpm_cents: default_assumed_cpm_cents(),
        }
    }
}

/// Control-loop cadence and retention windows
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    /// Seconds between scheduled control-loop cycles
    #[serde(default = "default_control_interval_secs")]
    pub interval_secs: u64,

    /// Raw traffic events older than this are purged
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Trailing window for trust recompute (fraud rate, event counts)
    #[serde(default = "default_trailing_window_days")]
    pub trailing_window_days: i64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_control_interval_secs(),
            retention_days: default_retention_days(),
            trailing_window_days: default_trailing_window_days(),
        }
    }
}

/// Fraud sweep rule thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct FraudConfig {
    /// Clicks from one source within the window to count as a flood
    #[serde(default = "default_click_flood_threshold")]
    pub click_flood_threshold: usize,

    /// Click-flood detection window in seconds
    #[serde(default = "default_click_flood_window_secs")]
    pub click_flood_window_secs: i64,

    /// Event sources that are always invalid
    #[serde(default)]
    pub blocked_sources: Vec<String>,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            click_flood_threshold: default_click_flood_threshold(),
            click_flood_window_secs: default_click_flood_window_secs(),
            blocked_sources: vec![],
        }
    }
}

// Default value functions
fn default_bind_addr() -> String {
    "127.0.0.1:8092".to_string()
}

fn default_auction_timeout_ms() -> u64 {
    120
}

fn default_max_debit_attempts() -> u32 {
    8
}

fn default_min_trust_score() -> f64 {
    40.0
}

fn default_pacing_factor() -> f64 {
    1.0
}

fn default_assumed_cpm_cents() -> u64 {
    50
}

fn default_control_interval_secs() -> u64 {
    900
}

fn default_retention_days() -> i64 {
    30
}

fn default_trailing_window_days() -> i64 {
    30
}

fn default_click_flood_threshold() -> usize {
    20
}

fn default_click_flood_window_secs() -> i64 {
    300
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix ADSERVER_)
            .add_source(
                config::Environment::with_prefix("ADSERVER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.auction.timeout_ms == 0 {
            anyhow::bail!("auction.timeout_ms must be positive");
        }

        if self.auction.max_debit_attempts == 0 {
            anyhow::bail!("auction.max_debit_attempts must be positive");
        }

        if !(0.0..=100.0).contains(&self.auction.min_trust_score) {
            anyhow::bail!("auction.min_trust_score must be between 0 and 100");
        }

        if self.auction.default_pacing_factor < 0.1 || self.auction.default_pacing_factor > 5.0 {
            anyhow::bail!("auction.default_pacing_factor must be within [0.1, 5.0]");
        }

        if self.pacing.assumed_cpm_cents == 0 {
            anyhow::bail!("pacing.assumed_cpm_cents must be positive");
        }

        if self.control.interval_secs == 0 {
            anyhow::bail!("control.interval_secs must be positive");
        }

        if self.control.retention_days <= 0 {
            anyhow::bail!("control.retention_days must be positive");
        }

        if self.control.trailing_window_days <= 0 {
            anyhow::bail!("control.trailing_window_days must be positive");
        }

        if self.fraud.click_flood_threshold == 0 {
            anyhow::bail!("fraud.click_flood_threshold must be positive");
        }

        Ok(())
    }

    /// Human-readable configuration summary for the `config` command
    pub fn display(&self) -> String {
        format!(
            r#"Configuration:
  Server:
    bind_addr: {}
  Auction:
    timeout: {}ms
    max_debit_attempts: {}
    min_trust_score: {}
    default_pacing_factor: {}
  Pacing:
    assumed_cpm: {} cents
  Control loop:
    interval: {}s
    retention: {} days
    trailing_window: {} days
  Fraud:
    click_flood_threshold: {}
    click_flood_window: {}s
    blocked_sources: {}
"#,
            self.server.bind_addr,
            self.auction.timeout_ms,
            self.auction.max_debit_attempts,
            self.auction.min_trust_score,
            self.auction.default_pacing_factor,
            self.pacing.assumed_cpm_cents,
            self.control.interval_secs,
            self.control.retention_days,
            self.control.trailing_window_days,
            self.fraud.click_flood_threshold,
            self.fraud.click_flood_window_secs,
            self.fraud.blocked_sources.len(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auction: AuctionConfig::default(),
            pacing: PacingConfig::default(),
            control: ControlConfig::default(),
            fraud: FraudConfig::default(),
        }
    }
}
