//! Error types for sealing.

use thiserror::Error;

/// Errors raised while encrypting a secret record or encoding the manifest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SealError {
    /// The public key was rejected or the cipher failed.
    #[error("Unable to seal secret: {message}")]
    Encryption { message: String },

    /// A `data` value is not valid base64.
    #[error("Invalid data value for key '{key}': {reason}")]
    InvalidData { key: String, reason: String },

    /// No serializer is registered for the requested media type.
    #[error("Cannot serialize {media_type}")]
    UnsupportedMediaType { media_type: String },

    /// The serializer failed.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Unknown sealing scope name.
    #[error("Invalid sealing scope '{value}' (expected strict, namespace-wide or cluster-wide)")]
    InvalidScope { value: String },

    /// Ciphertext could not be opened.
    #[error("Unable to decrypt value: {message}")]
    Decryption { message: String },
}

impl SealError {
    /// Create an encryption error.
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption { message: message.into() }
    }

    /// Create an invalid data error.
    pub fn invalid_data(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidData { key: key.into(), reason: reason.into() }
    }

    /// Create an unsupported media type error.
    pub fn unsupported_media_type(media_type: impl Into<String>) -> Self {
        Self::UnsupportedMediaType { media_type: media_type.into() }
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// Create a decryption error.
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption { message: message.into() }
    }
}
