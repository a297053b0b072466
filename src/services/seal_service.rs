//! Sealing business logic service
//!
//! Ties the pipeline together: resolve the controller key, build the record,
//! seal it. [`seal_request`] is the synchronous core for callers that already
//! hold a key; [`SealService`] adds the cached cluster lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use rsa::RsaPublicKey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
    cluster::{ClusterAccessor, KubeServiceProxy},
    config::Settings,
    errors::Error,
    keys::{fingerprint, PublicKeyResolver},
    seal::{seal_with_options, SealOptions, SealingScope, MEDIA_TYPE_YAML},
    secret::{build, SecretRecord},
};

/// Plaintext input for one sealed secret.
#[derive(Debug, Clone)]
pub struct SealRequest {
    pub name: String,
    pub namespace: String,
    /// Empty means `Opaque`.
    pub secret_type: String,
    /// Values are base64-encoded during the build, except for pre-encoded types.
    pub data: BTreeMap<String, String>,
    pub string_data: BTreeMap<String, String>,
    pub scope: SealingScope,
    pub media_type: String,
}

impl SealRequest {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            secret_type: String::new(),
            data: BTreeMap::new(),
            string_data: BTreeMap::new(),
            scope: SealingScope::Strict,
            media_type: MEDIA_TYPE_YAML.to_string(),
        }
    }

    pub fn with_type(mut self, secret_type: impl Into<String>) -> Self {
        self.secret_type = secret_type.into();
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_string_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.string_data.insert(key.into(), value.into());
        self
    }

    pub fn with_scope(mut self, scope: SealingScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    fn options(&self) -> SealOptions {
        SealOptions { scope: Some(self.scope), media_type: self.media_type.clone() }
    }
}

/// Encoded manifest plus the fingerprint of the key that sealed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedOutput {
    pub manifest: Vec<u8>,
    pub key_fingerprint: String,
    pub media_type: String,
}

/// Build and seal `request` under `key`.
///
/// # Errors
///
/// - [`Error::Build`] with [`BuildError::EmptyPayload`](crate::secret::BuildError::EmptyPayload)
///   when there is nothing to seal
/// - [`Error::Seal`] if encryption or encoding fails
pub fn seal_request(request: &SealRequest, key: &RsaPublicKey) -> Result<SealedOutput, Error> {
    let record = build(
        request.name.as_str(),
        request.namespace.as_str(),
        request.secret_type.as_str(),
        &request.data,
        &request.string_data,
    )?;
    seal_record(&record, key, &request.options())
}

/// Seal an already built record, e.g. one read with [`SecretRecord::from_manifest`].
pub fn seal_record(
    record: &SecretRecord,
    key: &RsaPublicKey,
    options: &SealOptions,
) -> Result<SealedOutput, Error> {
    let manifest = seal_with_options(record, key, options)?;
    Ok(SealedOutput {
        manifest,
        key_fingerprint: fingerprint(key),
        media_type: options.media_type.clone(),
    })
}

/// Seals secrets with the key of one controller, fetched through `A`.
pub struct SealService<A: ClusterAccessor> {
    resolver: Arc<PublicKeyResolver<A>>,
}

impl SealService<KubeServiceProxy> {
    /// Service for the controller and cluster named in `settings`.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if a referenced certificate, key or token file cannot be read
    /// - [`Error::Cluster`] if the connection material is rejected by the HTTP client
    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        let proxy = KubeServiceProxy::new(settings.cluster.to_cluster_config()?)?;
        let resolver =
            PublicKeyResolver::new(proxy, &settings.controller.name, &settings.controller.namespace);
        Ok(Self::new(Arc::new(resolver)))
    }
}

impl<A: ClusterAccessor> SealService<A> {
    /// Create a new seal service
    pub fn new(resolver: Arc<PublicKeyResolver<A>>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<PublicKeyResolver<A>> {
        &self.resolver
    }

    /// Fingerprint of the controller's current key.
    pub async fn key_fingerprint(&self, cancel: &CancellationToken) -> Result<String, Error> {
        let key = self.resolver.resolve(cancel).await?;
        let fingerprint = fingerprint(&key);
        debug!(
            controller = %self.resolver.controller_name(),
            namespace = %self.resolver.controller_namespace(),
            %fingerprint,
            "Resolved controller key"
        );
        Ok(fingerprint)
    }

    /// Resolve the controller key and seal `request` with it.
    #[instrument(skip(self, request, cancel), fields(name = %request.name, namespace = %request.namespace))]
    pub async fn seal(
        &self,
        request: &SealRequest,
        cancel: &CancellationToken,
    ) -> Result<SealedOutput, Error> {
        let key = self.resolver.resolve(cancel).await?;
        let output = seal_request(request, &key)?;

        info!(fingerprint = %output.key_fingerprint, bytes = output.manifest.len(), "Secret sealed");
        Ok(output)
    }

    /// Resolve the controller key and seal an existing record.
    #[instrument(skip_all, fields(name = %record.name(), namespace = %record.namespace()))]
    pub async fn seal_record(
        &self,
        record: &SecretRecord,
        options: &SealOptions,
        cancel: &CancellationToken,
    ) -> Result<SealedOutput, Error> {
        let key = self.resolver.resolve(cancel).await?;
        let output = seal_record(record, &key, options)?;

        info!(fingerprint = %output.key_fingerprint, bytes = output.manifest.len(), "Secret sealed");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::AccessError;
    use crate::keys::{public_key_from_pem, ResolveError};
    use crate::seal::{SealedSecret, MEDIA_TYPE_JSON};
    use crate::secret::BuildError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CONTROLLER_CERT: &str = include_str!("../../tests/fixtures/controller-cert.pem");

    struct StaticAccessor {
        response: Result<Vec<u8>, AccessError>,
        calls: AtomicUsize,
    }

    impl StaticAccessor {
        fn new(response: Result<Vec<u8>, AccessError>) -> Arc<Self> {
            Arc::new(Self { response, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl ClusterAccessor for StaticAccessor {
        async fn fetch(&self, _: &str, _: &str, _: &str) -> Result<Vec<u8>, AccessError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn service(accessor: Arc<StaticAccessor>) -> SealService<Arc<StaticAccessor>> {
        SealService::new(Arc::new(PublicKeyResolver::new(
            accessor,
            "sealed-secrets-controller",
            "kube-system",
        )))
    }

    #[test]
    fn test_seal_request_yaml() {
        let key = public_key_from_pem(CONTROLLER_CERT).unwrap();
        let request = SealRequest::new("name_aa", "ns_aa").with_data("keyAA", "valueAA");

        let output = seal_request(&request, &key).unwrap();
        let manifest: SealedSecret = serde_yaml::from_slice(&output.manifest).unwrap();

        assert_eq!(output.media_type, MEDIA_TYPE_YAML);
        assert_eq!(output.key_fingerprint, fingerprint(&key));
        assert_eq!(manifest.metadata.name, "name_aa");
        assert_eq!(manifest.spec.template.secret_type, "Opaque");
        assert!(manifest.spec.encrypted_data.contains_key("keyAA"));
    }

    #[test]
    fn test_seal_request_empty_payload() {
        let key = public_key_from_pem(CONTROLLER_CERT).unwrap();
        let err = seal_request(&SealRequest::new("a", "b"), &key).unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::EmptyPayload)));
        assert!(err.is_empty_payload());
    }

    #[test]
    fn test_seal_request_json_cluster_wide() {
        let key = public_key_from_pem(CONTROLLER_CERT).unwrap();
        let request = SealRequest::new("a", "b")
            .with_string_data("token", "t0k3n")
            .with_scope(SealingScope::ClusterWide)
            .with_media_type(MEDIA_TYPE_JSON);

        let output = seal_request(&request, &key).unwrap();
        let manifest: SealedSecret = serde_json::from_slice(&output.manifest).unwrap();
        assert_eq!(manifest.metadata.annotations["sealedsecrets.bitnami.com/cluster-wide"], "true");
    }

    #[tokio::test]
    async fn test_service_fetches_key_once() {
        let accessor = StaticAccessor::new(Ok(CONTROLLER_CERT.as_bytes().to_vec()));
        let service = service(accessor.clone());
        let cancel = CancellationToken::new();
        let request = SealRequest::new("a", "b").with_string_data("k", "v");

        let first = service.seal(&request, &cancel).await.unwrap();
        let second = service.seal(&request, &cancel).await.unwrap();

        assert_eq!(first.key_fingerprint, second.key_fingerprint);
        assert_ne!(first.manifest, second.manifest);
        assert_eq!(accessor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.key_fingerprint(&cancel).await.unwrap(), first.key_fingerprint);
    }

    #[tokio::test]
    async fn test_service_surfaces_resolve_errors() {
        let accessor = StaticAccessor::new(Err(AccessError::service_unavailable("503")));
        let service = service(accessor.clone());
        let cancel = CancellationToken::new();

        let err = service
            .seal(&SealRequest::new("a", "b").with_string_data("k", "v"), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Resolve(ResolveError::Fetch(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_service_seals_manifest_record() {
        let accessor = StaticAccessor::new(Ok(CONTROLLER_CERT.as_bytes().to_vec()));
        let service = service(accessor);
        let record = SecretRecord::from_manifest(
            b"apiVersion: v1\nkind: Secret\nmetadata:\n  name: a\n  namespace: b\ndata:\n  k: dg==\n",
        )
        .unwrap();

        let output = service
            .seal_record(&record, &SealOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        let manifest: SealedSecret = serde_yaml::from_slice(&output.manifest).unwrap();
        assert_eq!(manifest.metadata.namespace, "b");
    }

    #[test]
    fn test_from_settings_targets_configured_controller() {
        let mut settings = Settings::default();
        settings.controller.name = "sealer".to_string();
        settings.controller.namespace = "sealing".to_string();

        let service = SealService::from_settings(&settings).unwrap();
        assert_eq!(service.resolver().controller_name(), "sealer");
        assert_eq!(service.resolver().controller_namespace(), "sealing");
    }

    #[test]
    fn test_from_settings_rejects_bad_client_identity() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("client.crt");
        let key = dir.path().join("client.key");
        std::fs::write(&cert, "not a certificate").unwrap();
        std::fs::write(&key, "not a key").unwrap();

        let mut settings = Settings::default();
        settings.cluster.client_cert_path = Some(cert);
        settings.cluster.client_key_path = Some(key);

        let err = SealService::from_settings(&settings).err().unwrap();
        assert!(matches!(err, Error::Cluster(AccessError::Other { .. })), "got {:?}", err);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_settings_reports_missing_files() {
        let mut settings = Settings::default();
        settings.cluster.ca_cert_path = Some("/nonexistent/ca.crt".into());

        let err = SealService::from_settings(&settings).err().unwrap();
        assert!(matches!(err, Error::Io { .. }), "got {:?}", err);
    }
}
