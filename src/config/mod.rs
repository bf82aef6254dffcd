//! Configuration management module.
//!
//! Supports loading configuration from:
//! - TOML files (config/default.toml, config/{profile}.toml)
//! - Environment variables with `ECF_WORKER__<SECTION>__<KEY>` pattern

mod certification;
mod server;
mod storage;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use certification::{CertificationConfig, EndpointPaths, TimeoutConfig};
pub use server::ServerConfig;
pub use storage::{FileStorageConfig, StorageBackend, StorageConfig};

use crate::domain::sequence::DEFAULT_PREFIX;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sequence range configuration.
    #[serde(default)]
    pub sequence: SequenceConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Certification service configuration.
    #[serde(default)]
    pub certification: CertificationConfig,

    /// Failure notification configuration.
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{ECF_PROFILE}.toml` (if `ECF_PROFILE` is set)
    /// 3. Environment variables with `ECF_WORKER__` prefix
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let profile = std::env::var("ECF_PROFILE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{profile}")).required(false))
            // ECF_WORKER__CERTIFICATION__USERNAME=demo -> certification.username = demo
            .add_source(
                Environment::with_prefix("ECF_WORKER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("server.port cannot be 0".to_string()));
        }

        self.storage.validate()?;
        self.sequence.validate()?;
        self.certification.validate()?;

        if self.auth.admin_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "auth.admin_token cannot be empty".to_string(),
            ));
        }
        if let Some(entry) = self
            .auth
            .api_keys
            .iter()
            .find(|entry| entry.key.trim().is_empty() || entry.owner_id.trim().is_empty())
        {
            return Err(ConfigError::Message(format!(
                "auth.api_keys entry for '{}' needs both owner_id and key",
                entry.owner_id
            )));
        }

        if self.notification.enabled && self.notification.brevo_api_key.is_empty() {
            return Err(ConfigError::Message(
                "notification.brevo_api_key is required when notifications are enabled"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Sequence range configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceConfig {
    /// Percentage of a range's quantity at or below which it enters alert.
    #[serde(default = "default_alert_threshold_percent")]
    pub alert_threshold_percent: u8,

    /// Prefix used when a range does not specify one.
    #[serde(default = "default_prefix")]
    pub default_prefix: String,
}

const fn default_alert_threshold_percent() -> u8 {
    10
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            alert_threshold_percent: default_alert_threshold_percent(),
            default_prefix: default_prefix(),
        }
    }
}

impl SequenceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.alert_threshold_percent > 100 {
            return Err(ConfigError::Message(
                "sequence.alert_threshold_percent cannot exceed 100".to_string(),
            ));
        }
        let mut chars = self.default_prefix.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_uppercase() => Ok(()),
            _ => Err(ConfigError::Message(
                "sequence.default_prefix must be one uppercase letter".to_string(),
            )),
        }
    }
}

/// An API key and the account it belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyEntry {
    /// Owning account.
    pub owner_id: String,
    /// Bearer key.
    pub key: String,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Admin token for range administration.
    #[serde(default = "default_admin_token")]
    pub admin_token: String,

    /// API keys for number requests and invoice operations.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
}

fn default_admin_token() -> String {
    "admin_change_me_in_production".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_token: default_admin_token(),
            api_keys: Vec::new(),
        }
    }
}

/// Failure notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Send emails; when off, failures are only logged.
    #[serde(default)]
    pub enabled: bool,

    /// Recipient of failure reports.
    #[serde(default = "default_support_email")]
    pub support_email: String,

    /// Brevo API key.
    #[serde(default)]
    pub brevo_api_key: String,

    /// Brevo transactional email endpoint.
    #[serde(default = "default_brevo_url")]
    pub brevo_url: String,

    /// Sender display name.
    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    /// Sender address.
    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    /// Request timeout in seconds.
    #[serde(default = "default_notification_timeout")]
    pub timeout_secs: u64,
}

fn default_support_email() -> String {
    "soporte@example.com".to_string()
}

fn default_brevo_url() -> String {
    "https://api.brevo.com/v3/smtp/email".to_string()
}

fn default_sender_name() -> String {
    "e-CF Worker".to_string()
}

fn default_sender_email() -> String {
    "no-reply@example.com".to_string()
}

const fn default_notification_timeout() -> u64 {
    10
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            support_email: default_support_email(),
            brevo_api_key: String::new(),
            brevo_url: default_brevo_url(),
            sender_name: default_sender_name(),
            sender_email: default_sender_email(),
            timeout_secs: default_notification_timeout(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "text" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Enable Prometheus metrics endpoint.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    /// Metrics endpoint path.
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

const fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_enabled: true,
            metrics_path: default_metrics_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.sequence.alert_threshold_percent, 10);
        assert_eq!(config.sequence.default_prefix, "E");
        assert_eq!(config.certification.timeouts.submit_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_sections() {
        let mut config = AppConfig::default();
        config.sequence.default_prefix = "EX".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.notification.enabled = true;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auth.api_keys.push(ApiKeyEntry {
            owner_id: "clinic".to_string(),
            key: " ".to_string(),
        });
        assert!(config.validate().is_err());
    }
}
