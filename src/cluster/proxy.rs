//! HTTP cluster accessor using the API server's service proxy.
//!
//! Requests are sent to
//! `{host}/api/v1/namespaces/{namespace}/services/http:{name}:/proxy/{path}`,
//! authenticated with a client certificate and/or a bearer token.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client, Identity, StatusCode};
use tracing::{debug, trace};

use super::{AccessError, ClusterAccessor};

/// Default per-request timeout for cluster reads.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection material for the Kubernetes API server.
#[derive(Clone)]
pub struct ClusterConfig {
    /// API server base URL, e.g. `https://10.0.0.1:6443`.
    pub host: String,
    /// PEM-encoded cluster CA bundle. System roots are used when absent.
    pub ca_cert: Option<Vec<u8>>,
    /// PEM-encoded client certificate.
    pub client_cert: Option<Vec<u8>>,
    /// PEM-encoded client private key.
    pub client_key: Option<Vec<u8>>,
    /// Bearer token sent in the `Authorization` header.
    pub bearer_token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".to_string(),
            ca_cert: None,
            client_cert: None,
            client_key: None,
            bearer_token: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("host", &self.host)
            .field("ca_cert", &self.ca_cert.as_ref().map(|_| "<pem>"))
            .field("client_cert", &self.client_cert.as_ref().map(|_| "<pem>"))
            .field("client_key", &self.client_key.as_ref().map(|_| "[REDACTED]"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// [`ClusterAccessor`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct KubeServiceProxy {
    client: Client,
    host: String,
    bearer_token: Option<String>,
}

impl KubeServiceProxy {
    /// Build a proxy client from connection material.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Other`] if the CA bundle or client identity cannot be
    /// parsed, or the underlying HTTP client cannot be built.
    pub fn new(config: ClusterConfig) -> Result<Self, AccessError> {
        let mut builder = Client::builder().use_rustls_tls().timeout(config.timeout);

        if let Some(ca) = &config.ca_cert {
            for cert in Certificate::from_pem_bundle(ca)
                .map_err(|e| AccessError::other(format!("invalid cluster CA certificate: {}", e)))?
            {
                builder = builder.add_root_certificate(cert);
            }
        }

        match (&config.client_cert, &config.client_key) {
            (Some(cert), Some(key)) => {
                let mut pem = cert.clone();
                pem.push(b'\n');
                pem.extend_from_slice(key);
                let identity = Identity::from_pem(&pem)
                    .map_err(|e| AccessError::other(format!("invalid client identity: {}", e)))?;
                builder = builder.identity(identity);
            }
            (None, None) => {}
            _ => {
                return Err(AccessError::other(
                    "client certificate and client key must be configured together",
                ))
            }
        }

        let client = builder
            .build()
            .map_err(|e| AccessError::other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token,
        })
    }

    /// URL of `path` on the service proxy for the given controller.
    pub fn proxy_url(&self, controller_name: &str, controller_namespace: &str, path: &str) -> String {
        format!(
            "{}/api/v1/namespaces/{}/services/http:{}:/proxy/{}",
            self.host,
            controller_namespace,
            controller_name,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ClusterAccessor for KubeServiceProxy {
    async fn fetch(
        &self,
        controller_name: &str,
        controller_namespace: &str,
        path: &str,
    ) -> Result<Vec<u8>, AccessError> {
        let url = self.proxy_url(controller_name, controller_namespace, path);
        debug!("GET {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AccessError::other(format!("request to {} timed out", url))
            } else {
                AccessError::other(format!("request to {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            trace!(status = %status, body = %body, "Cluster returned error response");
            return Err(classify_status(status, &url, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AccessError::other(format!("unable to read response from cluster: {}", e)))?;

        Ok(bytes.to_vec())
    }
}

fn classify_status(status: StatusCode, url: &str, body: &str) -> AccessError {
    let message = if body.trim().is_empty() {
        format!("{} returned {}", url, status)
    } else {
        format!("{} returned {}: {}", url, status, body.trim())
    };

    match status {
        StatusCode::NOT_FOUND => AccessError::not_found(message),
        StatusCode::SERVICE_UNAVAILABLE => AccessError::service_unavailable(message),
        _ => AccessError::other(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROXY_PATH: &str =
        "/api/v1/namespaces/controllerNs_aaa/services/http:controllerName_aaa:/proxy/path_aaa";

    fn proxy_for(server: &MockServer) -> KubeServiceProxy {
        KubeServiceProxy::new(ClusterConfig { host: server.uri(), ..Default::default() }).unwrap()
    }

    #[test]
    fn test_proxy_url() {
        let proxy = KubeServiceProxy::new(ClusterConfig {
            host: "https://cluster.example.com:6443/".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            proxy.proxy_url("sealed-secrets-controller", "kube-system", "/v1/cert.pem"),
            "https://cluster.example.com:6443/api/v1/namespaces/kube-system/services/http:sealed-secrets-controller:/proxy/v1/cert.pem"
        );
        assert_eq!(
            proxy.proxy_url("controllerName_aaa", "controllerNs_aaa", "path_aaa"),
            "https://cluster.example.com:6443/api/v1/namespaces/controllerNs_aaa/services/http:controllerName_aaa:/proxy/path_aaa"
        );
    }

    #[test]
    fn test_half_configured_identity_is_rejected() {
        let result = KubeServiceProxy::new(ClusterConfig {
            client_cert: Some(b"cert".to_vec()),
            ..Default::default()
        });
        assert!(matches!(result, Err(AccessError::Other { .. })));
    }

    #[test]
    fn test_config_debug_redacts_credentials() {
        let config = ClusterConfig {
            client_key: Some(b"private".to_vec()),
            bearer_token: Some("token-value".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("token-value"));
        assert!(!debug.contains("private"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROXY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("this_should_work"))
            .expect(1)
            .mount(&server)
            .await;

        let body = proxy_for(&server)
            .fetch("controllerName_aaa", "controllerNs_aaa", "path_aaa")
            .await
            .unwrap();
        assert_eq!(body, b"this_should_work");
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROXY_PATH))
            .and(header("authorization", "Bearer abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let proxy = KubeServiceProxy::new(ClusterConfig {
            host: server.uri(),
            bearer_token: Some("abc123".to_string()),
            ..Default::default()
        })
        .unwrap();

        let body = proxy.fetch("controllerName_aaa", "controllerNs_aaa", "/path_aaa").await.unwrap();
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_fetch_classifies_status_codes() {
        let cases = [
            (404, "not_found"),
            (503, "service_unavailable"),
            (500, "other"),
            (403, "other"),
        ];

        for (status, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(PROXY_PATH))
                .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
                .mount(&server)
                .await;

            let err = proxy_for(&server)
                .fetch("controllerName_aaa", "controllerNs_aaa", "path_aaa")
                .await
                .unwrap_err();

            let actual = match &err {
                AccessError::NotFound { .. } => "not_found",
                AccessError::ServiceUnavailable { .. } => "service_unavailable",
                AccessError::Other { .. } => "other",
            };
            assert_eq!(actual, expected, "status {} classified as {:?}", status, err);
            assert!(err.to_string().contains("nope"));
        }
    }

    #[tokio::test]
    async fn test_fetch_connection_failure_is_not_retryable() {
        let proxy = KubeServiceProxy::new(ClusterConfig {
            host: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();

        let err = proxy.fetch("name", "ns", "/v1/cert.pem").await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
