//! Authenticated HTTP transport shared by both reporters.
//!
//! The [`HttpTransport`] trait is the seam the reporters are generic over;
//! [`ReqwestTransport`] is the production implementation and
//! [`crate::fakes::RecordingTransport`] the in-memory one used in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TransportError;

/// Basic-auth credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Everything needed to construct a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Root of the hosting service, e.g. `https://bitbucket.example.com`.
    pub base_url: String,
    pub credentials: Option<Credentials>,
    /// Log every request and response at debug level.
    pub debug: bool,
    /// Verify TLS certificates.
    pub verify: bool,
}

impl TransportConfig {
    pub fn new(base_url: &str) -> Self {
        TransportConfig {
            base_url: base_url.to_string(),
            credentials: None,
            debug: false,
            verify: true,
        }
    }

    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.credentials = Some(Credentials {
            user: user.to_string(),
            password: password.to_string(),
        });
        self
    }
}

/// A response whose body can be read once.
#[async_trait]
pub trait HttpResponse: Send {
    /// HTTP status code.
    fn code(&self) -> u16;

    /// Consume the response and read its body.
    async fn content(self) -> Result<Vec<u8>, TransportError>;
}

/// JSON-over-HTTP POST client rooted at a base URL.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    type Response: HttpResponse;

    /// POST `body` as JSON to `path`, relative to the base URL.
    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Self::Response, TransportError>;
}

/// `reqwest`-backed transport holding one pooled client for its lifetime.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    debug: bool,
}

impl ReqwestTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let parsed =
            url::Url::parse(&config.base_url).map_err(|e| TransportError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: e.to_string(),
            })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransportError::InvalidBaseUrl {
                url: config.base_url,
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("stashpush/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(!config.verify)
            .build()?;

        Ok(ReqwestTransport {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config.credentials,
            debug: config.debug,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Response returned by [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestResponse(reqwest::Response);

#[async_trait]
impl HttpResponse for ReqwestResponse {
    fn code(&self) -> u16 {
        self.0.status().as_u16()
    }

    async fn content(self) -> Result<Vec<u8>, TransportError> {
        Ok(self.0.bytes().await?.to_vec())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    type Response = ReqwestResponse;

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Self::Response, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        if self.debug {
            debug!(method = "POST", url = %url, body = %body, "sending request");
        }

        let mut request = self.client.post(&url).json(body);
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.user, Some(&creds.password));
        }
        let response = request.send().await?;

        if self.debug {
            debug!(url = %url, code = response.status().as_u16(), "received response");
        }
        Ok(ReqwestResponse(response))
    }
}
