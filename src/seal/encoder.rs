//! Output encoder selection.
//!
//! Each supported media type has a compact serializer and optionally a pretty
//! one. [`pretty_encoder`] prefers the pretty variant and falls back to the
//! compact one; YAML has only one form.

use super::error::SealError;
use super::manifest::SealedSecret;

pub const MEDIA_TYPE_YAML: &str = "application/yaml";
pub const MEDIA_TYPE_JSON: &str = "application/json";

/// Serializes a manifest to bytes.
pub type EncodeFn = fn(&SealedSecret) -> Result<Vec<u8>, SealError>;

/// Serializers registered for one media type.
#[derive(Clone, Copy)]
pub struct SerializerInfo {
    pub media_type: &'static str,
    pub serializer: EncodeFn,
    pub pretty_serializer: Option<EncodeFn>,
}

const SERIALIZERS: &[SerializerInfo] = &[
    SerializerInfo { media_type: MEDIA_TYPE_YAML, serializer: encode_yaml, pretty_serializer: None },
    SerializerInfo {
        media_type: MEDIA_TYPE_JSON,
        serializer: encode_json,
        pretty_serializer: Some(encode_json_pretty),
    },
];

/// All registered serializers.
pub fn supported_media_types() -> &'static [SerializerInfo] {
    SERIALIZERS
}

/// Look up the serializers for `media_type`.
pub fn serializer_info(media_type: &str) -> Option<&'static SerializerInfo> {
    SERIALIZERS.iter().find(|info| info.media_type == media_type)
}

/// Select the encoder for `media_type`, preferring the pretty variant.
///
/// # Errors
///
/// Returns [`SealError::UnsupportedMediaType`] for unknown media types.
pub fn pretty_encoder(media_type: &str) -> Result<EncodeFn, SealError> {
    let info =
        serializer_info(media_type).ok_or_else(|| SealError::unsupported_media_type(media_type))?;
    Ok(info.pretty_serializer.unwrap_or(info.serializer))
}

fn encode_yaml(manifest: &SealedSecret) -> Result<Vec<u8>, SealError> {
    serde_yaml::to_string(manifest)
        .map(String::into_bytes)
        .map_err(|e| SealError::serialization(e.to_string()))
}

fn encode_json(manifest: &SealedSecret) -> Result<Vec<u8>, SealError> {
    serde_json::to_vec(manifest).map_err(|e| SealError::serialization(e.to_string()))
}

fn encode_json_pretty(manifest: &SealedSecret) -> Result<Vec<u8>, SealError> {
    let mut bytes =
        serde_json::to_vec_pretty(manifest).map_err(|e| SealError::serialization(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}
