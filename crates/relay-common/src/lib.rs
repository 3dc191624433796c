//! # relay-common
//!
//! Shared utilities: environment-based configuration and tracing setup.

pub mod config;
pub mod telemetry;

// Re-export commonly used types
pub use config::{AppConfig, AppSettings, BotConfig, ConfigError, DatabaseConfig, Environment};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
