//! `SealedSecret` manifest types.
//!
//! Field order follows the controller's own encoder (keys sorted), so sealed
//! output diffs cleanly against manifests produced by other tooling.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const SEALED_SECRET_API_VERSION: &str = "bitnami.com/v1alpha1";
pub const SEALED_SECRET_KIND: &str = "SealedSecret";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedSecret {
    pub api_version: String,
    pub kind: String,
    pub metadata: ManifestMeta,
    pub spec: SealedSecretSpec,
}

/// Plaintext metadata carried on the manifest and its template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMeta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Always emitted as `null`.
    #[serde(default)]
    pub creation_timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    pub name: String,

    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedSecretSpec {
    /// Key to base64 ciphertext.
    pub encrypted_data: BTreeMap<String, String>,
    pub template: SecretTemplate,
}

/// Shape of the Secret the controller will create on unseal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretTemplate {
    pub metadata: ManifestMeta,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub secret_type: String,
}

impl SealedSecret {
    pub fn new(metadata: ManifestMeta, spec: SealedSecretSpec) -> Self {
        Self {
            api_version: SEALED_SECRET_API_VERSION.to_string(),
            kind: SEALED_SECRET_KIND.to_string(),
            metadata,
            spec,
        }
    }
}
