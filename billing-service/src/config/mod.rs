use clinic_core::config::{self as core_config, Environment, LogConfig, ServerConfig};
use clinic_core::error::AppError;
use secrecy::Secret;
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct BillingConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub billing: CurrencyConfig,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Mongodb,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub mongodb_uri: Option<Secret<String>>,
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            mongodb_uri: None,
            database: "clinic_billing".to_string(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct PaymentsConfig {
    /// Attempts at a version-checked invoice write before giving up with 409.
    pub max_write_attempts: u32,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            max_write_attempts: 5,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CurrencyConfig {
    pub currency: String,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
        }
    }
}

fn default_service_name() -> String {
    "billing-service".to_string()
}

impl BillingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let config: BillingConfig = core_config::load()?;
        config.validate()?;
        Ok(config)
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.payments.max_write_attempts == 0 {
            return Err(config_error("payments.max_write_attempts must be at least 1"));
        }

        if self.storage.backend == StorageBackend::Mongodb && self.storage.mongodb_uri.is_none() {
            return Err(config_error(
                "storage.mongodb_uri is required for the mongodb backend",
            ));
        }

        if self.billing.currency.trim().is_empty() {
            return Err(config_error("billing.currency must not be empty"));
        }

        if self.is_prod() {
            if self.storage.backend != StorageBackend::Mongodb {
                return Err(config_error(
                    "storage.backend must be mongodb in production",
                ));
            }
            if self.cors.allowed_origins.iter().any(|o| o.trim() == "*") {
                return Err(config_error(
                    "Wildcard CORS origin is not allowed in production",
                ));
            }
        }

        Ok(())
    }
}

fn config_error(message: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BillingConfig {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }

    #[test]
    fn defaults_run_locally_on_memory() {
        let config = base();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.payments.max_write_attempts, 5);
        assert_eq!(config.billing.currency, "INR");
        assert_eq!(config.service_name, "billing-service");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_write_attempts_is_rejected() {
        let mut config = base();
        config.payments.max_write_attempts = 0;
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn mongodb_backend_needs_uri() {
        let mut config = base();
        config.storage.backend = StorageBackend::Mongodb;
        assert!(config.validate().is_err());

        config.storage.mongodb_uri = Some(Secret::new("mongodb://localhost:27017".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn prod_requires_mongodb_and_explicit_origins() {
        let mut config = base();
        config.environment = Environment::Prod;
        assert!(config.validate().is_err());

        config.storage.backend = StorageBackend::Mongodb;
        config.storage.mongodb_uri = Some(Secret::new("mongodb://db:27017".to_string()));
        config.cors.allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());

        config.cors.allowed_origins = vec!["https://clinic.example.com".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn secret_uri_is_not_printed() {
        let mut config = base();
        config.storage.mongodb_uri = Some(Secret::new("mongodb://user:hunter2@db".to_string()));
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
