//! API configuration

use secrecy::Secret;
use serde::Deserialize;

use domain_billing::adapters::ProcessorConfig;

/// API configuration
///
/// Loaded once at startup and injected into the application state; no
/// component reads process-wide environment at call time.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    /// Payment processor API base URL
    pub processor_api_base_url: String,
    /// Payment processor secret key
    pub processor_secret_key: String,
    /// Shared secret for webhook signature verification
    pub processor_webhook_secret: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/invoicing".to_string(),
            log_level: "info".to_string(),
            processor_api_base_url: "https://api.processor.example/v1".to_string(),
            processor_secret_key: String::new(),
            processor_webhook_secret: String::new(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment variables with the `API_` prefix
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the processor client configuration
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            api_base_url: self.processor_api_base_url.clone(),
            secret_key: Secret::new(self.processor_secret_key.clone()),
            webhook_secret: Secret::new(self.processor_webhook_secret.clone()),
        }
    }
}
