//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `FTC_MEMBERSHIP` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use ftc_membership::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Poller schedule: {}", config.poller.schedule);
//! ```

mod apple;
mod database;
mod error;
mod log;
mod poller;
mod redis;
mod stripe;

pub use apple::AppleConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use log::LogConfig;
pub use poller::PollerConfig;
pub use redis::RedisConfig;
pub use stripe::StripeConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Redis configuration (receipt cache)
    pub redis: RedisConfig,

    /// Stripe API key, webhook secret and prices
    pub stripe: StripeConfig,

    /// Apple receipt verification
    pub apple: AppleConfig,

    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `FTC_MEMBERSHIP` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `FTC_MEMBERSHIP__DATABASE__URL=...` -> `database.url = ...`
    /// - `FTC_MEMBERSHIP__POLLER__SCHEDULE=02:30` -> `poller.schedule = "02:30"`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("FTC_MEMBERSHIP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.redis.validate()?;
        self.stripe.validate()?;
        self.apple.validate()?;
        self.poller.validate()?;
        self.log.validate()?;
        Ok(())
    }
}
