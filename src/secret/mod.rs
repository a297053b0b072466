//! Construction of secret records from plaintext payloads.

pub mod builder;
pub mod record;

use thiserror::Error;

pub use builder::build;
pub use record::{
    ObjectMeta, SecretRecord, DOCKER_CONFIG_JSON_TYPE, LAST_APPLIED_ANNOTATION, OPAQUE_TYPE,
};

/// Errors raised while constructing a [`SecretRecord`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Neither `data` nor `stringData` has any entries. Callers can treat this
    /// as "nothing to seal".
    #[error("Secret data and stringData cannot both be empty")]
    EmptyPayload,

    /// A secret manifest could not be read.
    #[error("Invalid secret manifest: {message}")]
    InvalidManifest { message: String },
}

impl BuildError {
    /// Create an invalid manifest error.
    pub fn invalid_manifest(message: impl Into<String>) -> Self {
        Self::InvalidManifest { message: message.into() }
    }
}
