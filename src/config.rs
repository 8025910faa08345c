//! Configuration management for the swap follower
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::follower::FollowerTuning;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub follower: FollowerConfig,
    pub ethereum: Option<EthereumConfig>,
    pub bitcoin: Option<BitcoinConfig>,
}

/// Where the settlement daemon listens and which peer it should see.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub url: String,
    pub expected_peer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,
    #[serde(default = "default_event_timeout_secs")]
    pub event_timeout_secs: u64,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            action_timeout_secs: default_action_timeout_secs(),
            event_timeout_secs: default_event_timeout_secs(),
        }
    }
}

impl FollowerConfig {
    pub fn tuning(&self) -> FollowerTuning {
        FollowerTuning {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            action_timeout: Duration::from_secs(self.action_timeout_secs),
            event_timeout: Duration::from_secs(self.event_timeout_secs),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_action_timeout_secs() -> u64 {
    20
}

fn default_event_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct EthereumConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Name of the environment variable holding the signing key.
    pub private_key_env: String,
    /// Directory for the cross-process account lock files.
    pub lock_dir: PathBuf,
    #[serde(default = "default_lock_max_attempts")]
    pub lock_max_attempts: u32,
    #[serde(default = "default_lock_base_delay_ms")]
    pub lock_base_delay_ms: u64,
}

fn default_lock_max_attempts() -> u32 {
    10
}

fn default_lock_base_delay_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitcoinConfig {
    pub rpc_url: String,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("SWAP_FOLLOWER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.daemon
            .url
            .parse::<reqwest::Url>()
            .with_context(|| format!("Invalid daemon url: {}", self.daemon.url))?;

        if self.ethereum.is_none() && self.bitcoin.is_none() {
            anyhow::bail!("At least one ledger must be configured");
        }

        if let Some(ethereum) = &self.ethereum {
            if ethereum.private_key_env.is_empty() {
                anyhow::bail!("ethereum.private_key_env must name an environment variable");
            }
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
