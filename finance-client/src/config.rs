use config::{ConfigError, Environment, File};
use payment_core::collections::parse_penalty_amount;
use payment_core::MAX_PROOF_BYTES;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub api: ApiConfig,
    pub payments: PaymentPolicy,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Used when no session has been loaded
    #[serde(default)]
    pub bearer_token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PaymentPolicy {
    pub max_proof_bytes: usize,
    pub default_penalty: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_secs: 30,
            bearer_token: None,
        }
    }
}

impl Default for PaymentPolicy {
    fn default() -> Self {
        Self {
            max_proof_bytes: MAX_PROOF_BYTES,
            default_penalty: "50".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PaymentPolicy {
    pub fn default_penalty_amount(&self) -> Option<Decimal> {
        parse_penalty_amount(&self.default_penalty).ok()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let defaults = Config::default();

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("api.timeout_secs", defaults.api.timeout_secs)?
            .set_default("payments.max_proof_bytes", defaults.payments.max_proof_bytes as u64)?
            .set_default("payments.default_penalty", defaults.payments.default_penalty)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.json", defaults.logging.json)?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(Environment::with_prefix("FINANCE_PORTAL").separator("__"));

        if let Ok(api_url) = env::var("FINANCE_API_URL") {
            builder = builder.set_override("api.base_url", api_url)?;
        }

        if let Ok(token) = env::var("FINANCE_API_TOKEN") {
            builder = builder.set_override("api.bearer_token", token)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.api.base_url.trim().is_empty() {
            return Err("API base URL is required".to_string());
        }

        if self.api.timeout_secs == 0 {
            return Err("API timeout cannot be 0".to_string());
        }

        if self.payments.max_proof_bytes == 0 {
            return Err("Proof document size limit cannot be 0".to_string());
        }

        if self.payments.default_penalty_amount().is_none() {
            return Err(format!(
                "Default penalty must be a positive amount, got {:?}",
                self.payments.default_penalty
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:5000/api");
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert_eq!(config.payments.max_proof_bytes, 5 * 1024 * 1024);
        assert_eq!(config.payments.default_penalty_amount(), Some(dec!(50)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.api.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.api.base_url = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.payments.default_penalty = "-5".to_string();
        assert!(config.validate().is_err());
    }
}
