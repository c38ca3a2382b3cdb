//! HTTP connector for token-authenticated REST APIs.
//!
//! Dialing builds a `reqwest` client and verifies the api token with a
//! single `GET {address}{verify_path}`. The resulting [`HttpConnection`]
//! carries the client and token so later calls reuse the connection pool.
//!
//! This backend has no rotation capability.

use std::fmt;

use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Url};
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::ConnectionConfig;
use crate::connector::Connector;
use crate::error::ConnectError;
use crate::settings::ProducerSettings;

/// Backend type name reported by [`HttpConnector`].
pub const HTTP_BACKEND_TYPE: &str = "http";

/// Dials HTTP(S) APIs that accept a bearer token.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    user_agent: String,
}

impl HttpConnector {
    /// Create a connector using the given settings.
    #[must_use]
    pub fn new(settings: &ProducerSettings) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
        }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(&ProducerSettings::default())
    }
}

/// A verified HTTP connection.
#[derive(Clone)]
pub struct HttpConnection {
    client: reqwest::Client,
    base_url: Url,
    token: Zeroizing<String>,
}

impl HttpConnection {
    /// Base address of the remote API.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Start an authenticated request to `path` under the base address.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        self.client
            .request(method, url)
            .bearer_auth(self.token.as_str())
            .header(ACCEPT, "application/json")
    }
}

impl fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Connector for HttpConnector {
    type Connection = HttpConnection;

    fn type_name(&self) -> &'static str {
        HTTP_BACKEND_TYPE
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<HttpConnection, ConnectError> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(config.connect_timeout())
            .danger_accept_invalid_certs(config.tls_skip_verify())
            .build()
            .map_err(|e| ConnectError::Client {
                reason: e.to_string(),
            })?;

        let connection = HttpConnection {
            client,
            base_url: config.address().clone(),
            token: Zeroizing::new(config.api_token().to_owned()),
        };

        let resp = connection
            .request(Method::GET, config.verify_path())
            .send()
            .await
            .map_err(|source| ConnectError::Network {
                endpoint: config.endpoint().to_owned(),
                source,
            })?;

        let status = resp.status().as_u16();
        debug!(url = %config.verify_url(), status, "verification response");
        match status {
            200..=299 => Ok(connection),
            401 | 403 => Err(ConnectError::Unauthorized { status }),
            _ => Err(ConnectError::UnexpectedStatus { status }),
        }
    }
}
