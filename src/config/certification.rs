//! Certification service configuration.

use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;

/// Connection settings for the certification service.
#[derive(Debug, Clone, Deserialize)]
pub struct CertificationConfig {
    /// Base URL of the service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Account user name.
    #[serde(default)]
    pub username: String,

    /// Account password.
    #[serde(default)]
    pub password: String,

    /// Issuer tax ID registered with the service.
    #[serde(default)]
    pub tax_id: String,

    /// Endpoint paths, relative to `base_url`.
    #[serde(default)]
    pub paths: EndpointPaths,

    /// Per-operation timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Renew the token when it expires within this many seconds.
    #[serde(default = "default_refresh_margin_secs")]
    pub token_refresh_margin_secs: u64,

    /// Token lifetime assumed when the service sends no usable expiration.
    #[serde(default = "default_token_fallback_ttl_secs")]
    pub token_fallback_ttl_secs: u64,
}

fn default_base_url() -> String {
    "https://demoemision.thefactoryhka.com.do".to_string()
}

const fn default_refresh_margin_secs() -> u64 {
    5 * 60
}

const fn default_token_fallback_ttl_secs() -> u64 {
    60 * 60
}

impl Default for CertificationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: String::new(),
            password: String::new(),
            tax_id: String::new(),
            paths: EndpointPaths::default(),
            timeouts: TimeoutConfig::default(),
            token_refresh_margin_secs: default_refresh_margin_secs(),
            token_fallback_ttl_secs: default_token_fallback_ttl_secs(),
        }
    }
}

impl CertificationConfig {
    /// Full URL of an endpoint path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Token refresh margin.
    #[must_use]
    pub const fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.token_refresh_margin_secs)
    }

    /// Fallback token lifetime.
    #[must_use]
    pub const fn fallback_ttl(&self) -> Duration {
        Duration::from_secs(self.token_fallback_ttl_secs)
    }

    /// Validate the certification configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an HTTP(S) URL or a timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Message(format!("certification.base_url is invalid: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Message(
                "certification.base_url must use http or https".to_string(),
            ));
        }
        let t = &self.timeouts;
        if [t.auth_secs, t.submit_secs, t.status_secs, t.annul_secs, t.download_secs].contains(&0)
        {
            return Err(ConfigError::Message(
                "certification.timeouts cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Endpoint paths.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointPaths {
    /// Authentication.
    #[serde(default = "default_auth_path")]
    pub auth: String,
    /// Document submission.
    #[serde(default = "default_submit_path")]
    pub submit: String,
    /// Status query.
    #[serde(default = "default_status_path")]
    pub status: String,
    /// Number annulment.
    #[serde(default = "default_annul_path")]
    pub annul: String,
    /// File download.
    #[serde(default = "default_download_path")]
    pub download: String,
}

fn default_auth_path() -> String {
    "/api/Autenticacion".to_string()
}

fn default_submit_path() -> String {
    "/api/Enviar".to_string()
}

fn default_status_path() -> String {
    "/api/EstatusDocumento".to_string()
}

fn default_annul_path() -> String {
    "/api/Anulacion".to_string()
}

fn default_download_path() -> String {
    "/api/DescargaArchivo".to_string()
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            auth: default_auth_path(),
            submit: default_submit_path(),
            status: default_status_path(),
            annul: default_annul_path(),
            download: default_download_path(),
        }
    }
}

/// Per-operation timeouts in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Authentication.
    #[serde(default = "default_auth_secs")]
    pub auth_secs: u64,
    /// Submission.
    #[serde(default = "default_submit_secs")]
    pub submit_secs: u64,
    /// Status query.
    #[serde(default = "default_status_secs")]
    pub status_secs: u64,
    /// Annulment.
    #[serde(default = "default_long_secs")]
    pub annul_secs: u64,
    /// Download.
    #[serde(default = "default_long_secs")]
    pub download_secs: u64,
}

const fn default_auth_secs() -> u64 {
    15
}

const fn default_submit_secs() -> u64 {
    60
}

const fn default_status_secs() -> u64 {
    10
}

const fn default_long_secs() -> u64 {
    30
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            auth_secs: default_auth_secs(),
            submit_secs: default_submit_secs(),
            status_secs: default_status_secs(),
            annul_secs: default_long_secs(),
            download_secs: default_long_secs(),
        }
    }
}
