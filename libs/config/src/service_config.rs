//! Service Configuration Module
//!
//! Provides configuration loading for Campus services. Supports loading from
//! TOML files with `CAMPUS_*` environment-variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default delay between reconnection attempts, in seconds.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 3;

/// Default connection-establishment timeout, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Top-level configuration for a Campus deployment.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Settings shared by every service.
    #[serde(default)]
    pub global: GlobalConfig,

    /// Real-time delivery settings.
    pub realtime: RealtimeSettings,
}

/// Settings shared by every service.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GlobalConfig {
    /// Log filter directive, e.g. `info` or `realtime=debug`.
    pub log_level: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Settings for the real-time hub connection.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RealtimeSettings {
    /// Distribution hub endpoint, `ws://` or `wss://`. May reference
    /// environment variables, e.g. `wss://${CAMPUS_HUB_HOST}/feed`.
    pub endpoint: String,

    /// Seconds between reconnection attempts.
    pub reconnect_delay_secs: Option<u64>,

    /// Seconds to wait for connection establishment before giving up on an
    /// attempt.
    pub connect_timeout_secs: Option<u64>,
}

impl RealtimeSettings {
    /// Reconnect delay with the default applied.
    pub fn reconnect_delay_secs(&self) -> u64 {
        self.reconnect_delay_secs
            .unwrap_or(DEFAULT_RECONNECT_DELAY_SECS)
    }

    /// Connect timeout with the default applied.
    pub fn connect_timeout_secs(&self) -> u64 {
        self.connect_timeout_secs
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
    }
}

impl AppConfig {
    /// Load configuration from `path` (default `config/campus.toml`) with
    /// `CAMPUS_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = path.unwrap_or_else(|| Path::new("config/campus.toml"));
        debug!("Loading configuration from {:?}", base);

        let builder = Config::builder()
            .add_source(File::from(base).required(true))
            // Override with environment variables (CAMPUS_ prefix)
            .add_source(
                Environment::with_prefix("CAMPUS")
                    .separator("_")
                    .try_parsing(true),
            );

        let config = builder.build().context("Failed to build configuration")?;

        let mut config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.expand_env_vars()?;
        Ok(config)
    }

    /// Expand environment variables in endpoint values.
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let expanded = shellexpand::env(&self.realtime.endpoint)
            .context("Failed to expand hub endpoint")?;
        self.realtime.endpoint = expanded.into_owned();
        Ok(())
    }
}

/// Convenience function to load configuration with defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    AppConfig::load(path)
}
