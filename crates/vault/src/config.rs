//! Configuration loading and validation for the field encryption service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crypto::{EncryptionKey, KeyError};

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// AES-256 key: 64 hex characters or 32 raw bytes. **Required.**
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Port the HTTP(S) server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// PEM certificate chain. Set together with `tls_key_path` to serve HTTPS.
    #[serde(default)]
    pub tls_cert_path: Option<String>,

    /// PEM private key. Set together with `tls_cert_path` to serve HTTPS.
    #[serde(default)]
    pub tls_key_path: Option<String>,

    /// Suffix appended to a field name to form its IV sibling in records.
    #[serde(default = "default_iv_field_suffix")]
    pub iv_field_suffix: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// OTLP/gRPC endpoint for span export. Export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    8443
}
fn default_iv_field_suffix() -> String {
    "_iv".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}
fn default_log_level() -> String {
    "info".into()
}

/// Certificate and key file locations for the HTTPS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths<'a> {
    pub cert: &'a str,
    pub key: &'a str,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(env: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(env)
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Parse the configured encryption key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Missing`] if `ENCRYPTION_KEY` is unset or empty and
    /// [`KeyError::InvalidLength`] if it has the wrong length.
    pub fn encryption_key(&self) -> Result<EncryptionKey, KeyError> {
        EncryptionKey::from_config(self.encryption_key.as_deref())
    }

    /// TLS file paths, or `None` when the server should run plain HTTP.
    pub fn tls_paths(&self) -> Option<TlsPaths<'_>> {
        match (
            non_empty(&self.tls_cert_path),
            non_empty(&self.tls_key_path),
        ) {
            (Some(cert), Some(key)) => Some(TlsPaths { cert, key }),
            _ => None,
        }
    }

    /// OTLP endpoint, if span export is enabled.
    pub fn otlp_endpoint(&self) -> Option<&str> {
        non_empty(&self.otel_exporter_otlp_endpoint)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        self.encryption_key().context("ENCRYPTION_KEY is invalid")?;

        match (
            non_empty(&self.tls_cert_path),
            non_empty(&self.tls_key_path),
        ) {
            (Some(_), None) => anyhow::bail!("TLS_KEY_PATH is required when TLS_CERT_PATH is set"),
            (None, Some(_)) => anyhow::bail!("TLS_CERT_PATH is required when TLS_KEY_PATH is set"),
            _ => {}
        }

        if self.iv_field_suffix.is_empty() {
            anyhow::bail!("IV_FIELD_SUFFIX must not be empty");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be > 0");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("MAX_BODY_BYTES must be > 0");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("listen_port", &self.listen_port)
            .field("tls_cert_path", &self.tls_cert_path)
            .field("tls_key_path", &self.tls_key_path)
            .field("iv_field_suffix", &self.iv_field_suffix)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_body_bytes", &self.max_body_bytes)
            .field(
                "otel_exporter_otlp_endpoint",
                &self.otel_exporter_otlp_endpoint,
            )
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
