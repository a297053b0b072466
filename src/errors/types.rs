//! # Error Types
//!
//! Crate-level error wrapping the per-stage errors of the sealing pipeline.

use std::path::PathBuf;

use crate::cluster::AccessError;
use crate::keys::ResolveError;
use crate::seal::SealError;
use crate::secret::BuildError;

/// Custom result type for sealedsecret operations
pub type Result<T> = std::result::Result<T, SealedSecretError>;

/// Main error type for the sealedsecret client
#[derive(thiserror::Error, Debug)]
pub enum SealedSecretError {
    /// Cluster API access failed outside of key resolution
    #[error("Cluster access failed: {0}")]
    Cluster(#[from] AccessError),

    /// The controller public key could not be obtained
    #[error("Public key resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// The secret record could not be built
    #[error("Secret construction failed: {0}")]
    Build(#[from] BuildError),

    /// Encryption or encoding failed
    #[error("Sealing failed: {0}")]
    Seal(#[from] SealError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// I/O errors with the path involved
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SealedSecretError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an I/O error for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Whether the builder reported nothing to seal.
    pub fn is_empty_payload(&self) -> bool {
        matches!(self, Self::Build(BuildError::EmptyPayload))
    }

    /// Whether retrying the operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cluster(e) => e.is_retryable(),
            Self::Resolve(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for SealedSecretError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors.errors().keys().next().map(|k| k.to_string());
        Self::Validation { message: errors.to_string(), field }
    }
}

impl From<config::ConfigError> for SealedSecretError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Failed to load settings", Box::new(error))
    }
}
