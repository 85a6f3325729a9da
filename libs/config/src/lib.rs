//! # Campus Centralized Configuration
//!
//! Configuration loading for Campus services: a TOML file, environment
//! overrides through `CAMPUS_*` variables, and `${VAR}` expansion in endpoint
//! URLs, so a deployment can point dashboard sessions at the right
//! distribution hub without code changes.
//!
//! ## Usage
//!
//! ```no_run
//! use config::AppConfig;
//!
//! let config = AppConfig::load(None).expect("config/campus.toml missing");
//! println!("hub endpoint: {}", config.realtime.endpoint);
//! ```

pub mod service_config;

pub use service_config::{
    load_config, AppConfig, GlobalConfig, RealtimeSettings, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_RECONNECT_DELAY_SECS,
};
