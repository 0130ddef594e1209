//! Cart service configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                     | Default     |
//! |------------------------------|-------------|
//! | `BASKET_DATABASE_PATH`       | `basket.db` |
//! | `BASKET_VAT_RATE_BPS`        | `2000`      |
//! | `BASKET_DELIVERY_CHARGE`     | `5.00`      |
//! | `BASKET_MAX_RETRIES`         | `3`         |
//! | `BASKET_RETRY_BASE_DELAY_MS` | `20`        |
//! | `BASKET_RETRY_MAX_DELAY_MS`  | `500`       |

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;
use basket_core::{Money, PricingConfig, VatRate};
use basket_db::DbConfig;

/// Cart service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartConfig {
    /// SQLite database file
    pub database_path: String,

    /// VAT rate in basis points (2000 = 20%)
    pub vat_rate_bps: u32,

    /// Flat, VAT-exclusive delivery charge applied once per cart
    pub delivery_charge: Money,

    /// Extra attempts after a transient failure
    pub max_retries: u32,

    /// First backoff delay in milliseconds
    pub retry_base_delay_ms: u64,

    /// Backoff cap in milliseconds
    pub retry_max_delay_ms: u64,
}

impl Default for CartConfig {
    fn default() -> Self {
        CartConfig {
            database_path: "basket.db".to_string(),
            vat_rate_bps: 2000,
            delivery_charge: Money::from_minor(500),
            max_retries: 3,
            retry_base_delay_ms: 20,
            retry_max_delay_ms: 500,
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_source<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = CartConfig {
            database_path: get("BASKET_DATABASE_PATH").unwrap_or_else(|| "basket.db".to_string()),

            vat_rate_bps: parse(&get, "BASKET_VAT_RATE_BPS", "2000")?,

            delivery_charge: parse(&get, "BASKET_DELIVERY_CHARGE", "5.00")?,

            max_retries: parse(&get, "BASKET_MAX_RETRIES", "3")?,

            retry_base_delay_ms: parse(&get, "BASKET_RETRY_BASE_DELAY_MS", "20")?,

            retry_max_delay_ms: parse(&get, "BASKET_RETRY_MAX_DELAY_MS", "500")?,
        };

        if config.vat_rate_bps > 10_000 {
            return Err(ConfigError::InvalidValue("BASKET_VAT_RATE_BPS".to_string()));
        }

        if config.delivery_charge.is_negative() {
            return Err(ConfigError::InvalidValue("BASKET_DELIVERY_CHARGE".to_string()));
        }

        if config.retry_max_delay_ms < config.retry_base_delay_ms {
            return Err(ConfigError::InvalidValue(
                "BASKET_RETRY_MAX_DELAY_MS".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn pricing(&self) -> PricingConfig {
        PricingConfig::new(VatRate::from_bps(self.vat_rate_bps), self.delivery_charge)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
    }
}

fn parse<T, F>(get: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
