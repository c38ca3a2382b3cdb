//! Connection producer: configuration and connection lifecycle for a backend.
//!
//! The producer owns three pieces of mutable state: the validated
//! [`ConnectionConfig`], the raw payload it was decoded from, and the cached
//! connection handle. All three live behind a single async mutex, so every
//! operation on one producer is totally ordered and no caller ever sees a
//! config from one `initialize` paired with a handle or raw payload from
//! another.
//!
//! The flow is:
//!
//! 1. **Initialize**: decode + default + validate the payload, optionally
//!    dial to verify it, then swap in the new config and handle and release
//!    the previous handle.
//!
//! 2. **Connection**: hand out the cached handle, dialing on first use.
//!
//! 3. **Set credentials**: rotate a named principal's password through the
//!    connector's rotation capability, if it has one.
//!
//! 4. **Close**: drop the cached handle. The config stays, so the next
//!    `connection()` dials again.
//!
//! Cancellation is by dropping the returned future. A handle is stored only
//! after the dial completes, so an abandoned dial leaves nothing cached, and
//! an abandoned verifying `initialize` leaves the previous config in place.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::connector::{Connector, Credentials, Statements, StaticUserConfig};
use crate::error::{ConnectError, ProducerError, RotationError};
use crate::redact;
use crate::settings::ProducerSettings;

/// Label substituted for the api token by [`ConnectionProducer::redact`].
pub const API_TOKEN_LABEL: &str = "[apitoken]";

/// Everything guarded by the producer's lock.
///
/// `config.is_some()` is the initialized flag. `connection` is only ever
/// `Some` while `config` is.
struct ProducerState<T> {
    config: Option<ConnectionConfig>,
    raw_config: Map<String, Value>,
    connection: Option<Arc<T>>,
}

/// Manages configuration, connection, and credential rotation for one
/// backend instance.
///
/// Safe to share across tasks behind an `Arc`.
pub struct ConnectionProducer<C: Connector> {
    connector: C,
    settings: ProducerSettings,
    state: Mutex<ProducerState<C::Connection>>,
}

impl<C: Connector> ConnectionProducer<C> {
    /// Create an uninitialized producer with default settings.
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self::with_settings(connector, ProducerSettings::default())
    }

    /// Create an uninitialized producer with the given settings.
    #[must_use]
    pub fn with_settings(connector: C, settings: ProducerSettings) -> Self {
        Self {
            connector,
            settings,
            state: Mutex::new(ProducerState {
                config: None,
                raw_config: Map::new(),
                connection: None,
            }),
        }
    }

    /// Validate and install a connection config.
    ///
    /// Replaces any previous config wholesale and tears down any cached
    /// connection. When `verify_connection` is set, the new config is dialed
    /// before anything is replaced. Returns the payload exactly as received.
    ///
    /// Dropping the future before it completes leaves the previous config and
    /// connection in place.
    ///
    /// # Errors
    ///
    /// - [`ProducerError::ConfigDecode`] / [`ProducerError::InvalidConfig`] if
    ///   the payload is unusable. The producer is left uninitialized.
    /// - [`ProducerError::VerificationFailed`] if the verification dial
    ///   fails. The config stays installed and a later
    ///   [`connection`](Self::connection) may retry.
    pub async fn initialize(
        &self,
        raw: Map<String, Value>,
        verify_connection: bool,
    ) -> Result<Map<String, Value>, ProducerError> {
        let mut state = self.state.lock().await;

        let config = match ConnectionConfig::decode(&raw, &self.settings) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "rejected connection config");
                state.config = None;
                state.raw_config = Map::new();
                let previous = state.connection.take();
                self.release(previous).await;
                return Err(e);
            }
        };
        info!(
            backend = self.connector.type_name(),
            endpoint = %config.endpoint(),
            address = %config.address(),
            "connection config accepted"
        );

        // State is untouched until the dial settles.
        let (connection, outcome) = if verify_connection {
            match self.dial(&config).await {
                Ok(connection) => (Some(Arc::new(connection)), Ok(raw.clone())),
                Err(e) => (None, Err(ProducerError::VerificationFailed(e))),
            }
        } else {
            (None, Ok(raw.clone()))
        };
        if connection.is_some() {
            info!(endpoint = %config.endpoint(), "connection established");
        }

        let previous = state.connection.take();
        state.config = Some(config);
        state.raw_config = raw;
        state.connection = connection;
        self.release(previous).await;

        outcome
    }

    /// Return the live connection, dialing if none is cached.
    ///
    /// Repeated calls return the same `Arc` until [`close`](Self::close) or
    /// a re-initialize.
    ///
    /// # Errors
    ///
    /// - [`ProducerError::NotInitialized`] before a successful initialize.
    /// - [`ProducerError::ConnectionFailed`] if the dial fails or times out.
    ///   Nothing is cached.
    pub async fn connection(&self) -> Result<Arc<C::Connection>, ProducerError> {
        let mut state = self.state.lock().await;
        self.establish(&mut state).await
    }

    /// Drop the cached connection, if any.
    ///
    /// Idempotent. The producer stays initialized.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` is part of the host contract.
    pub async fn close(&self) -> Result<(), ProducerError> {
        let mut state = self.state.lock().await;
        self.teardown(&mut state).await;
        Ok(())
    }

    /// Set the password of an existing, caller-named principal.
    ///
    /// Used for static-account rotation and for rolling back a password
    /// change the host failed to persist. Dials on demand.
    ///
    /// # Errors
    ///
    /// - [`ProducerError::NotInitialized`] before a successful initialize.
    /// - [`ProducerError::NotImplemented`] if the backend cannot rotate. No
    ///   state is touched.
    /// - [`ProducerError::InvalidRequest`] for an empty username or password.
    /// - [`ProducerError::ConnectionFailed`] if no connection can be made.
    /// - [`ProducerError::CredentialRotation`] if the remote call fails. A
    ///   lost connection also drops the cached handle.
    pub async fn set_credentials(
        &self,
        statements: &Statements,
        user: &StaticUserConfig,
    ) -> Result<Credentials, ProducerError> {
        let mut state = self.state.lock().await;
        if state.config.is_none() {
            return Err(ProducerError::NotInitialized);
        }
        let Some(rotator) = self.connector.rotator() else {
            return Err(ProducerError::NotImplemented {
                operation: "set_credentials",
            });
        };
        if user.username.trim().is_empty() {
            return Err(ProducerError::InvalidRequest {
                reason: "username cannot be empty".to_owned(),
            });
        }
        if user.password.is_empty() {
            return Err(ProducerError::InvalidRequest {
                reason: "password cannot be empty".to_owned(),
            });
        }

        let connection = self.establish(&mut state).await?;
        match rotator
            .set_credentials(connection.as_ref(), statements, user)
            .await
        {
            Ok(credentials) => {
                info!(username = %credentials.username, "credentials set");
                Ok(credentials)
            }
            Err(source) => {
                warn!(username = %user.username, error = %source, "credential rotation failed");
                if matches!(source, RotationError::ConnectionLost { .. }) {
                    self.teardown(&mut state).await;
                }
                Err(ProducerError::CredentialRotation {
                    username: user.username.clone(),
                    source,
                })
            }
        }
    }

    /// Secret values currently held, mapped to their redaction labels.
    ///
    /// For scrubbing logs and diagnostics only. Empty when uninitialized.
    pub async fn secret_values(&self) -> HashMap<String, &'static str> {
        let state = self.state.lock().await;
        state
            .config
            .as_ref()
            .map(|config| HashMap::from([(config.api_token().to_owned(), API_TOKEN_LABEL)]))
            .unwrap_or_default()
    }

    /// Replace every held secret in `text` with its label.
    pub async fn redact(&self, text: &str) -> String {
        redact::redact(text, &self.secret_values().await)
    }

    /// The installed raw payload with every held secret value replaced by
    /// its label. `None` when uninitialized.
    pub async fn redacted_config(&self) -> Option<Map<String, Value>> {
        let secrets = self.secret_values().await;
        self.raw_config()
            .await
            .map(|raw| redact::redact_values(&raw, &secrets))
    }

    /// Whether a valid config is installed.
    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.config.is_some()
    }

    /// Whether a connection is currently cached.
    pub async fn has_connection(&self) -> bool {
        self.state.lock().await.connection.is_some()
    }

    /// Snapshot of the installed config.
    pub async fn config(&self) -> Option<ConnectionConfig> {
        self.state.lock().await.config.clone()
    }

    /// The payload the installed config was decoded from, as received.
    pub async fn raw_config(&self) -> Option<Map<String, Value>> {
        let state = self.state.lock().await;
        state.config.as_ref().map(|_| state.raw_config.clone())
    }

    /// Backend type name of the connector.
    pub fn type_name(&self) -> &'static str {
        self.connector.type_name()
    }

    /// The connector this producer dials through.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Settings used for config defaults.
    pub fn settings(&self) -> &ProducerSettings {
        &self.settings
    }

    /// Return the cached connection or dial a new one. Caller holds the lock.
    async fn establish(
        &self,
        state: &mut ProducerState<C::Connection>,
    ) -> Result<Arc<C::Connection>, ProducerError> {
        let Some(config) = state.config.as_ref() else {
            return Err(ProducerError::NotInitialized);
        };
        if let Some(connection) = &state.connection {
            debug!(endpoint = %config.endpoint(), "reusing cached connection");
            return Ok(Arc::clone(connection));
        }

        let connection = Arc::new(self.dial(config).await.map_err(ProducerError::ConnectionFailed)?);

        info!(endpoint = %config.endpoint(), "connection established");
        state.connection = Some(Arc::clone(&connection));
        Ok(connection)
    }

    /// Dial `config` within its connect timeout. Touches no state.
    async fn dial(&self, config: &ConnectionConfig) -> Result<C::Connection, ConnectError> {
        let timeout = config.connect_timeout();
        let dialed = match tokio::time::timeout(timeout, self.connector.connect(config)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectError::Timeout {
                timeout_secs: timeout.as_secs(),
            }),
        };
        dialed.inspect_err(|e| {
            warn!(endpoint = %config.endpoint(), error = %e, "connection attempt failed");
        })
    }

    /// Take the cached connection out of its slot and release it. Caller
    /// holds the lock.
    async fn teardown(&self, state: &mut ProducerState<C::Connection>) {
        let connection = state.connection.take();
        self.release(connection).await;
    }

    /// Hand a connection that is no longer in its slot back to the connector.
    async fn release(&self, connection: Option<Arc<C::Connection>>) {
        if let Some(connection) = connection {
            self.connector.disconnect(connection).await;
            info!(backend = self.connector.type_name(), "connection closed");
        }
    }
}

impl<C: Connector> fmt::Debug for ConnectionProducer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProducer")
            .field("backend", &self.connector.type_name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
