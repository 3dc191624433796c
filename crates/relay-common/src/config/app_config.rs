//! Application configuration structs
//!
//! Loads configuration from environment variables.

use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub bot: BotConfig,
    pub database: DatabaseConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Read the environment from `APP_ENV`, defaulting to development
    #[must_use]
    pub fn from_env() -> Self {
        env::var("APP_ENV")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "production" => Some(Self::Production),
                "staging" => Some(Self::Staging),
                "development" => Some(Self::Development),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Bot connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Bot token presented to the gateway and the REST API
    pub token: String,
    /// Base URL of the REST API, e.g. `https://chat.example.com/api/v9`
    pub api_base_url: String,
    /// Explicit gateway WebSocket URL, skipping discovery (mainly for tests)
    #[serde(default)]
    pub gateway_url: Option<String>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

// Default value functions
fn default_app_name() -> String {
    "relay".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let token = env::var("BOT_TOKEN").map_err(|_| ConfigError::MissingVar("BOT_TOKEN"))?;
        if token.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "BOT_TOKEN",
                "must not be empty".to_string(),
            ));
        }

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: Environment::from_env(),
            },
            bot: BotConfig {
                token,
                api_base_url: env::var("API_BASE_URL")
                    .map_err(|_| ConfigError::MissingVar("API_BASE_URL"))?,
                gateway_url: env::var("GATEWAY_URL").ok(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_max_connections),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_min_connections),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
