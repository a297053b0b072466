//! # Configuration Settings
//!
//! Defines the configuration structure for the sealedsecret client.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::cluster::ClusterConfig;
use crate::errors::{Result, SealedSecretError};

/// Settings file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "sealedsecret";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "SEALEDSECRET";

/// Separator for nested keys, e.g. `SEALEDSECRET_CLUSTER__HOST` sets `cluster.host`.
const ENV_SEPARATOR: &str = "__";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    /// Kubernetes API server connection
    #[validate(nested)]
    pub cluster: ClusterSettings,

    /// Sealing controller identity
    #[validate(nested)]
    pub controller: ControllerSettings,

    /// Log output
    #[validate(nested)]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from `path` (or `sealedsecret.toml` in the working
    /// directory if present) overlaid with `SEALEDSECRET_*` environment
    /// variables, then validate them.
    ///
    /// # Errors
    ///
    /// - [`SealedSecretError::Config`] if an explicit file is missing or a source fails to parse
    /// - [`SealedSecretError::Validation`] if a value is out of range
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(env);

        let settings: Settings = config::Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(SealedSecretError::from)?;
        self.validate_custom()
    }

    /// Effective settings as TOML with the bearer token masked.
    pub fn to_toml_redacted(&self) -> Result<String> {
        let mut redacted = self.clone();
        if redacted.cluster.bearer_token.is_some() {
            redacted.cluster.bearer_token = Some("[REDACTED]".to_string());
        }
        toml::to_string_pretty(&redacted)
            .map_err(|e| SealedSecretError::config_with_source("Failed to render settings", Box::new(e)))
    }

    fn validate_custom(&self) -> Result<()> {
        let host = &self.cluster.host;
        if !host.starts_with("https://") && !host.starts_with("http://") {
            return Err(SealedSecretError::validation_field(
                "Cluster host must start with 'https://' or 'http://'",
                "cluster.host",
            ));
        }

        if self.cluster.client_cert_path.is_some() != self.cluster.client_key_path.is_some() {
            return Err(SealedSecretError::validation_field(
                "Client certificate and client key must be configured together",
                "cluster.client_cert_path",
            ));
        }

        Ok(())
    }
}

/// Kubernetes API server connection settings
#[derive(Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClusterSettings {
    /// API server base URL
    #[validate(length(min = 1, message = "Cluster host cannot be empty"))]
    pub host: String,

    /// PEM file with the cluster CA bundle
    pub ca_cert_path: Option<PathBuf>,

    /// PEM file with the client certificate
    pub client_cert_path: Option<PathBuf>,

    /// PEM file with the client private key
    pub client_key_path: Option<PathBuf>,

    /// Bearer token
    pub bearer_token: Option<String>,

    /// File holding a bearer token, e.g. a mounted service account token
    pub bearer_token_path: Option<PathBuf>,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            host: "https://localhost:6443".to_string(),
            ca_cert_path: None,
            client_cert_path: None,
            client_key_path: None,
            bearer_token: None,
            bearer_token_path: None,
            timeout_seconds: 10,
        }
    }
}

impl fmt::Debug for ClusterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterSettings")
            .field("host", &self.host)
            .field("ca_cert_path", &self.ca_cert_path)
            .field("client_cert_path", &self.client_cert_path)
            .field("client_key_path", &self.client_key_path)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[REDACTED]"))
            .field("bearer_token_path", &self.bearer_token_path)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl ClusterSettings {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Read the referenced PEM and token files into a [`ClusterConfig`].
    ///
    /// An inline `bearer_token` takes precedence over `bearer_token_path`.
    pub fn to_cluster_config(&self) -> Result<ClusterConfig> {
        let bearer_token = match (&self.bearer_token, &self.bearer_token_path) {
            (Some(token), _) => Some(token.clone()),
            (None, Some(path)) => Some(read_string(path)?.trim().to_string()),
            (None, None) => None,
        };

        Ok(ClusterConfig {
            host: self.host.clone(),
            ca_cert: self.ca_cert_path.as_deref().map(read_bytes).transpose()?,
            client_cert: self.client_cert_path.as_deref().map(read_bytes).transpose()?,
            client_key: self.client_key_path.as_deref().map(read_bytes).transpose()?,
            bearer_token,
            timeout: self.timeout(),
        })
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| SealedSecretError::io(path, e))
}

fn read_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| SealedSecretError::io(path, e))
}

/// Identity of the sealing controller
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ControllerSettings {
    /// Controller service name
    #[validate(length(min = 1, message = "Controller name cannot be empty"))]
    pub name: String,

    /// Namespace the controller runs in
    #[validate(length(min = 1, message = "Controller namespace cannot be empty"))]
    pub namespace: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self { name: "sealed-secrets-controller".to_string(), namespace: "kube-system".to_string() }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level directive when `RUST_LOG` is unset
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    /// Enable JSON structured logging
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn".to_string(), json: false }
    }
}
