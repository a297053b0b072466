//! # Sealing
//!
//! Turns a [`SecretRecord`] into a `SealedSecret` manifest whose values can only
//! be opened by the controller holding the private half of the public key.
//!
//! Every value is encrypted separately with [`crypto::hybrid_encrypt`]. The
//! OAEP label is derived from the [`SealingScope`]:
//!
//! | Scope            | Label             | Annotation                                    |
//! |------------------|-------------------|-----------------------------------------------|
//! | `strict`         | `namespace/name`  | none                                          |
//! | `namespace-wide` | `namespace`       | `sealedsecrets.bitnami.com/namespace-wide`    |
//! | `cluster-wide`   | empty             | `sealedsecrets.bitnami.com/cluster-wide`      |
//!
//! Server-assigned metadata on the record is dropped before anything is
//! written, so the same logical record always yields the same plaintext
//! fields.

pub mod crypto;
pub mod encoder;
pub mod error;
pub mod manifest;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use rsa::RsaPublicKey;
use tracing::{debug, info};

use crate::secret::SecretRecord;

pub use crypto::{hybrid_decrypt, hybrid_encrypt};
pub use encoder::{pretty_encoder, supported_media_types, MEDIA_TYPE_JSON, MEDIA_TYPE_YAML};
pub use error::SealError;
pub use manifest::{ManifestMeta, SealedSecret, SealedSecretSpec, SecretTemplate};

pub const NAMESPACE_WIDE_ANNOTATION: &str = "sealedsecrets.bitnami.com/namespace-wide";
pub const CLUSTER_WIDE_ANNOTATION: &str = "sealedsecrets.bitnami.com/cluster-wide";

/// Where a sealed secret may be unsealed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SealingScope {
    /// Only under the original name and namespace.
    #[default]
    Strict,
    /// Under any name within the original namespace.
    NamespaceWide,
    /// Under any name in any namespace.
    ClusterWide,
}

impl SealingScope {
    /// OAEP label binding ciphertext to this scope.
    pub fn label(&self, namespace: &str, name: &str) -> String {
        match self {
            Self::Strict => format!("{}/{}", namespace, name),
            Self::NamespaceWide => namespace.to_string(),
            Self::ClusterWide => String::new(),
        }
    }

    /// Annotation key marking this scope, if any.
    pub fn annotation(&self) -> Option<&'static str> {
        match self {
            Self::Strict => None,
            Self::NamespaceWide => Some(NAMESPACE_WIDE_ANNOTATION),
            Self::ClusterWide => Some(CLUSTER_WIDE_ANNOTATION),
        }
    }

    /// Scope requested by a secret's annotations. Cluster-wide wins over
    /// namespace-wide.
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> Self {
        let enabled = |key: &str| annotations.get(key).is_some_and(|v| v == "true");
        if enabled(CLUSTER_WIDE_ANNOTATION) {
            Self::ClusterWide
        } else if enabled(NAMESPACE_WIDE_ANNOTATION) {
            Self::NamespaceWide
        } else {
            Self::Strict
        }
    }

    /// Replace any scope annotations in `annotations` with this scope's.
    fn apply(&self, annotations: &mut BTreeMap<String, String>) {
        annotations.remove(NAMESPACE_WIDE_ANNOTATION);
        annotations.remove(CLUSTER_WIDE_ANNOTATION);
        if let Some(key) = self.annotation() {
            annotations.insert(key.to_string(), "true".to_string());
        }
    }
}

impl fmt::Display for SealingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Strict => "strict",
            Self::NamespaceWide => "namespace-wide",
            Self::ClusterWide => "cluster-wide",
        };
        f.write_str(name)
    }
}

impl FromStr for SealingScope {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "namespace-wide" => Ok(Self::NamespaceWide),
            "cluster-wide" => Ok(Self::ClusterWide),
            _ => Err(SealError::InvalidScope { value: s.to_string() }),
        }
    }
}

/// Options for [`seal_with_options`].
#[derive(Debug, Clone)]
pub struct SealOptions {
    /// Explicit scope. When `None` the record's annotations decide.
    pub scope: Option<SealingScope>,
    /// Output media type, see [`supported_media_types`].
    pub media_type: String,
}

impl Default for SealOptions {
    fn default() -> Self {
        Self { scope: None, media_type: MEDIA_TYPE_YAML.to_string() }
    }
}

/// Seal `record` under `key` and encode it as pretty YAML.
///
/// # Errors
///
/// See [`seal_with_options`].
pub fn seal(record: &SecretRecord, key: &RsaPublicKey) -> Result<Vec<u8>, SealError> {
    seal_with_options(record, key, &SealOptions::default())
}

/// Seal `record` under `key` and encode it with the encoder selected for
/// `options.media_type`.
///
/// # Errors
///
/// - [`SealError::UnsupportedMediaType`] for an unknown media type
/// - [`SealError::InvalidData`] if a `data` value is not base64
/// - [`SealError::Encryption`] if the key cannot be used
/// - [`SealError::Serialization`] if encoding fails
pub fn seal_with_options(
    record: &SecretRecord,
    key: &RsaPublicKey,
    options: &SealOptions,
) -> Result<Vec<u8>, SealError> {
    let encode = pretty_encoder(&options.media_type)?;
    let scope =
        options.scope.unwrap_or_else(|| SealingScope::from_annotations(&record.metadata().annotations));
    let manifest = seal_to_manifest(&mut OsRng, record, key, scope)?;
    encode(&manifest)
}

/// Build the `SealedSecret` for `record` without encoding it.
///
/// # Errors
///
/// - [`SealError::InvalidData`] if a `data` value is not base64
/// - [`SealError::Encryption`] if the key cannot be used
pub fn seal_to_manifest<R: RngCore + CryptoRng>(
    rng: &mut R,
    record: &SecretRecord,
    key: &RsaPublicKey,
    scope: SealingScope,
) -> Result<SealedSecret, SealError> {
    let record = record.without_server_metadata();
    let label = scope.label(record.namespace(), record.name());

    let mut encrypted_data = BTreeMap::new();
    for (k, encoded) in record.data() {
        let plaintext =
            STANDARD.decode(encoded).map_err(|e| SealError::invalid_data(k, e.to_string()))?;
        let ciphertext = hybrid_encrypt(rng, key, &plaintext, &label)?;
        encrypted_data.insert(k.clone(), STANDARD.encode(ciphertext));
    }
    // stringData wins on key collisions, as the API server does.
    for (k, value) in record.string_data() {
        let ciphertext = hybrid_encrypt(rng, key, value.as_bytes(), &label)?;
        encrypted_data.insert(k.clone(), STANDARD.encode(ciphertext));
    }

    let meta = record.metadata();

    let mut template_annotations = meta.annotations.clone();
    scope.apply(&mut template_annotations);
    let template_meta = ManifestMeta {
        annotations: template_annotations,
        creation_timestamp: None,
        labels: meta.labels.clone(),
        name: meta.name.clone(),
        namespace: meta.namespace.clone(),
    };

    let mut annotations = BTreeMap::new();
    scope.apply(&mut annotations);
    let top_meta = ManifestMeta {
        annotations,
        creation_timestamp: None,
        labels: BTreeMap::new(),
        name: meta.name.clone(),
        namespace: meta.namespace.clone(),
    };

    debug!(label = %label, "derived sealing label");
    info!(
        name = %record.name(),
        namespace = %record.namespace(),
        secret_type = %record.secret_type(),
        scope = %scope,
        keys = encrypted_data.len(),
        "Sealed secret"
    );

    Ok(SealedSecret::new(
        top_meta,
        SealedSecretSpec {
            encrypted_data,
            template: SecretTemplate {
                metadata: template_meta,
                secret_type: record.secret_type().to_string(),
            },
        },
    ))
}
