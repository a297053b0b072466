use std::collections::BTreeMap;
use std::fmt::Display;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::record::{ObjectMeta, SecretRecord, DOCKER_CONFIG_JSON_TYPE, OPAQUE_TYPE};
use super::BuildError;

/// Build a secret record from plaintext payload maps.
///
/// `data` values are stringified and base64-encoded, except for the
/// `kubernetes.io/dockerconfigjson` type whose values must already be encoded
/// and are stored verbatim. `string_data` values are stored as given. An empty
/// `secret_type` means `Opaque`.
///
/// Name and namespace are not validated here.
///
/// # Errors
///
/// Returns [`BuildError::EmptyPayload`] when both maps are empty.
pub fn build<V: Display>(
    name: impl Into<String>,
    namespace: impl Into<String>,
    secret_type: impl Into<String>,
    data: &BTreeMap<String, V>,
    string_data: &BTreeMap<String, String>,
) -> Result<SecretRecord, BuildError> {
    if data.is_empty() && string_data.is_empty() {
        return Err(BuildError::EmptyPayload);
    }

    let mut secret_type = secret_type.into();
    if secret_type.is_empty() {
        secret_type = OPAQUE_TYPE.to_string();
    }

    let pre_encoded = secret_type == DOCKER_CONFIG_JSON_TYPE;
    let data = data
        .iter()
        .map(|(key, value)| {
            let value = value.to_string();
            let stored = if pre_encoded { value } else { STANDARD.encode(value.as_bytes()) };
            (key.clone(), stored)
        })
        .collect();

    Ok(SecretRecord {
        metadata: ObjectMeta::new(name, namespace),
        secret_type,
        data,
        string_data: string_data.clone(),
    })
}
