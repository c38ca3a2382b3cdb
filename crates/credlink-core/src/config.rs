//! Connection configuration record.
//!
//! A [`ConnectionConfig`] can only be obtained from [`ConnectionConfig::decode`],
//! which runs weak coercion, applies defaults, and validates required fields
//! in that order. Holding one therefore means the endpoint and api token are
//! both present.

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::decode;
use crate::error::ProducerError;
use crate::settings::ProducerSettings;

/// Canonical name of the endpoint field, used in error messages.
pub const FIELD_URL: &str = "url";

/// Canonical name of the api token field, used in error messages.
pub const FIELD_API_TOKEN: &str = "apitoken";

const URL_KEYS: &[&str] = &["url", "endpoint"];
const API_TOKEN_KEYS: &[&str] = &["apitoken", "api_token"];
const PORT_KEYS: &[&str] = &["port"];
const TIMEOUT_KEYS: &[&str] = &["connect_timeout"];
const VERIFY_PATH_KEYS: &[&str] = &["verify_path"];
const TLS_SKIP_VERIFY_KEYS: &[&str] = &["tls_skip_verify", "insecure"];

/// Validated connection settings for the remote credential-issuing system.
#[derive(Clone)]
pub struct ConnectionConfig {
    endpoint: String,
    api_token: Zeroizing<String>,
    port: u16,
    address: Url,
    connect_timeout: Duration,
    verify_path: String,
    tls_skip_verify: bool,
}

impl ConnectionConfig {
    /// Decode, default, and validate a raw config payload.
    ///
    /// Unknown keys are ignored. The payload itself is not modified.
    ///
    /// # Errors
    ///
    /// - [`ProducerError::ConfigDecode`] if a field has the wrong shape.
    /// - [`ProducerError::InvalidConfig`] if `url` or `apitoken` is empty, or
    ///   the endpoint is not a usable http(s) URL.
    pub fn decode(raw: &Map<String, Value>, settings: &ProducerSettings) -> Result<Self, ProducerError> {
        let endpoint = decode::string(raw, FIELD_URL, URL_KEYS)?.unwrap_or_default();
        let api_token = Zeroizing::new(
            decode::string(raw, FIELD_API_TOKEN, API_TOKEN_KEYS)?.unwrap_or_default(),
        );
        let api_token = Zeroizing::new(api_token.trim().to_owned());
        let port = decode::unsigned(raw, "port", PORT_KEYS)?.unwrap_or(0);
        let timeout_secs = decode::unsigned(raw, "connect_timeout", TIMEOUT_KEYS)?.unwrap_or(0);
        let verify_path = decode::string(raw, "verify_path", VERIFY_PATH_KEYS)?.unwrap_or_default();
        let tls_skip_verify =
            decode::boolean(raw, "tls_skip_verify", TLS_SKIP_VERIFY_KEYS)?.unwrap_or(false);

        let port = u16::try_from(port).map_err(|_| ProducerError::ConfigDecode {
            field: "port",
            reason: format!("{port} is out of range for a port"),
        })?;

        // Defaults.
        let port = if port == 0 { settings.default_port } else { port };
        let connect_timeout = if timeout_secs == 0 {
            settings.connect_timeout
        } else {
            Duration::from_secs(timeout_secs)
        };
        let verify_path = match verify_path.trim() {
            "" => "/".to_owned(),
            p if p.starts_with('/') => p.to_owned(),
            p => format!("/{p}"),
        };

        let endpoint = endpoint.trim().to_owned();
        if endpoint.is_empty() {
            return Err(invalid(FIELD_URL, "cannot be empty"));
        }
        if api_token.is_empty() {
            return Err(invalid(FIELD_API_TOKEN, "cannot be empty"));
        }

        let address = resolve_address(&endpoint, port)?;

        Ok(Self {
            endpoint,
            api_token,
            port,
            address,
            connect_timeout,
            verify_path,
            tls_skip_verify,
        })
    }

    /// The endpoint as configured.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The api token. Callers must not log or persist it.
    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    /// Port applied to the endpoint when it did not name one.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Fully resolved address of the remote system.
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Upper bound on a single dial.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Path requested to verify the api token.
    pub fn verify_path(&self) -> &str {
        &self.verify_path
    }

    /// Whether TLS certificate verification is disabled.
    pub fn tls_skip_verify(&self) -> bool {
        self.tls_skip_verify
    }

    /// Full URL requested to verify the api token.
    pub fn verify_url(&self) -> String {
        format!(
            "{}{}",
            self.address.as_str().trim_end_matches('/'),
            self.verify_path
        )
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("api_token", &"[REDACTED]")
            .field("address", &self.address.as_str())
            .field("connect_timeout", &self.connect_timeout)
            .field("verify_path", &self.verify_path)
            .field("tls_skip_verify", &self.tls_skip_verify)
            .finish()
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ProducerError {
    ProducerError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}

/// Turn the configured endpoint into a dialable URL.
///
/// A bare host gets `https://`. An explicit port in the endpoint wins over
/// the configured one, even when it is the scheme default.
fn resolve_address(endpoint: &str, port: u16) -> Result<Url, ProducerError> {
    let candidate = if endpoint.contains("://") {
        endpoint.to_owned()
    } else {
        format!("https://{endpoint}")
    };

    let mut url = Url::parse(&candidate)
        .map_err(|e| invalid(FIELD_URL, format!("is not a valid URL: {e}")))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(
            FIELD_URL,
            format!("has unsupported scheme '{}', expected http or https", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid(FIELD_URL, "has no host"));
    }
    if !names_port(&candidate) && url.set_port(Some(port)).is_err() {
        return Err(invalid(FIELD_URL, "cannot carry a port"));
    }
    Ok(url)
}

/// Whether the endpoint text carries a port.
///
/// `Url::port` cannot answer this: it drops a port equal to the scheme
/// default, so `https://host:443` would look portless.
fn names_port(candidate: &str) -> bool {
    let rest = candidate.split_once("://").map_or(candidate, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    // IPv6 literals carry colons inside the brackets.
    let after_host = host_port.rsplit_once(']').map_or(host_port, |(_, tail)| tail);
    after_host
        .split_once(':')
        .is_some_and(|(_, port)| !port.is_empty())
}
