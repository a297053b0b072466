//! In-memory secret record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::BuildError;

/// Secret type used when none is given.
pub const OPAQUE_TYPE: &str = "Opaque";

/// Secret type whose `data` values are already base64-encoded by the caller.
pub const DOCKER_CONFIG_JSON_TYPE: &str = "kubernetes.io/dockerconfigjson";

/// Annotation `kubectl apply` uses to store the full previous object, payload included.
pub const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Object metadata of a secret.
///
/// Besides identity it can carry the fields a cluster assigns to a live object.
/// Those are never sealed; see [`ObjectMeta::strip_server_fields`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_grace_period_seconds: Option<i64>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { name: name.into(), namespace: namespace.into(), ..Default::default() }
    }

    /// Clear self-link, UID, resource version, generation, timestamps and
    /// deletion markers, and drop the last-applied configuration annotation.
    pub fn strip_server_fields(&mut self) {
        self.annotations.remove(LAST_APPLIED_ANNOTATION);
        self.self_link = None;
        self.uid = None;
        self.resource_version = None;
        self.generation = None;
        self.creation_timestamp = None;
        self.deletion_timestamp = None;
        self.deletion_grace_period_seconds = None;
    }

    /// Whether any cluster-assigned field is set.
    pub fn has_server_fields(&self) -> bool {
        self.self_link.is_some()
            || self.uid.is_some()
            || self.resource_version.is_some()
            || self.generation.is_some()
            || self.creation_timestamp.is_some()
            || self.deletion_timestamp.is_some()
            || self.deletion_grace_period_seconds.is_some()
            || self.annotations.contains_key(LAST_APPLIED_ANNOTATION)
    }
}

/// A normalized secret ready for sealing.
///
/// `data` holds base64 text, `string_data` holds literal values. At least one of
/// them is non-empty. Records are only produced by
/// [`build`](super::build) or [`SecretRecord::from_manifest`] and are not
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub(super) metadata: ObjectMeta,
    pub(super) secret_type: String,
    pub(super) data: BTreeMap<String, String>,
    pub(super) string_data: BTreeMap<String, String>,
}

/// Wire shape of a `v1/Secret` document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretManifest {
    api_version: Option<String>,
    kind: Option<String>,
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(rename = "type")]
    secret_type: Option<String>,
    data: Option<BTreeMap<String, String>>,
    string_data: Option<BTreeMap<String, String>>,
}

impl SecretRecord {
    /// Read a record from a `v1/Secret` YAML or JSON document, e.g. the output of
    /// `kubectl get secret -o yaml`.
    ///
    /// `data` values are taken as already base64-encoded, as Kubernetes stores
    /// them. Server-assigned metadata is kept here and dropped at sealing time.
    ///
    /// # Errors
    ///
    /// - [`BuildError::InvalidManifest`] if the document does not parse or is not a `v1` `Secret`
    /// - [`BuildError::EmptyPayload`] if it has neither `data` nor `stringData`
    pub fn from_manifest(bytes: &[u8]) -> Result<Self, BuildError> {
        let manifest: SecretManifest = serde_yaml::from_slice(bytes)
            .map_err(|e| BuildError::invalid_manifest(e.to_string()))?;

        if let Some(kind) = manifest.kind.as_deref() {
            if kind != "Secret" {
                return Err(BuildError::invalid_manifest(format!(
                    "expected kind Secret, got {}",
                    kind
                )));
            }
        }
        if let Some(api_version) = manifest.api_version.as_deref() {
            if api_version != "v1" {
                return Err(BuildError::invalid_manifest(format!(
                    "expected apiVersion v1, got {}",
                    api_version
                )));
            }
        }

        let data = manifest.data.unwrap_or_default();
        let string_data = manifest.string_data.unwrap_or_default();
        if data.is_empty() && string_data.is_empty() {
            return Err(BuildError::EmptyPayload);
        }

        Ok(Self {
            metadata: manifest.metadata,
            secret_type: manifest
                .secret_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| OPAQUE_TYPE.to_string()),
            data,
            string_data,
        })
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn secret_type(&self) -> &str {
        &self.secret_type
    }

    pub fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    /// Base64-encoded payload values.
    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    /// Literal payload values.
    pub fn string_data(&self) -> &BTreeMap<String, String> {
        &self.string_data
    }

    /// Copy of this record with all server-assigned metadata removed.
    pub fn without_server_metadata(&self) -> Self {
        let mut stripped = self.clone();
        stripped.metadata.strip_server_fields();
        stripped
    }
}
