//! Collaborator traits for reaching the remote credential-issuing system.
//!
//! A [`Connector`] knows how to dial a backend from a validated
//! [`ConnectionConfig`]. Credential rotation is an optional capability: a
//! connector advertises it by returning a [`CredentialRotator`] from
//! [`Connector::rotator`]. Connectors without one make
//! `set_credentials` fail with `NotImplemented`.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ConnectionConfig;
use crate::error::{ConnectError, RotationError};

/// Dials the remote system.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The live connection handed out by the producer.
    type Connection: Send + Sync + 'static;

    /// Backend type name, reported to the host for diagnostics.
    fn type_name(&self) -> &'static str;

    /// Open and verify a connection.
    ///
    /// The producer bounds this call with the config's connect timeout and
    /// may drop the future at any await point.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectError`] describing why the remote system could not
    /// be reached or refused the credentials.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection, ConnectError>;

    /// Release a connection that the producer no longer hands out.
    ///
    /// Other holders of the `Arc` may still be using it. The default does
    /// nothing beyond dropping the producer's reference.
    async fn disconnect(&self, connection: Arc<Self::Connection>) {
        drop(connection);
    }

    /// The rotation capability, if this backend has one.
    fn rotator(&self) -> Option<&dyn CredentialRotator<Self::Connection>> {
        None
    }
}

/// Sets the password of a caller-named principal on the remote system.
///
/// A call either succeeds entirely or fails leaving remote state unchanged.
#[async_trait::async_trait]
pub trait CredentialRotator<C: Send + Sync>: Send + Sync {
    /// Apply `statements` to set `user`'s password.
    ///
    /// # Errors
    ///
    /// - [`RotationError::Rejected`] if the remote system refused the change.
    /// - [`RotationError::ConnectionLost`] if the connection broke; the
    ///   producer drops its cached handle in response.
    async fn set_credentials(
        &self,
        connection: &C,
        statements: &Statements,
        user: &StaticUserConfig,
    ) -> Result<Credentials, RotationError>;
}

/// Backend-defined commands that perform a rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statements {
    /// Commands in execution order. `{{name}}` and `{{password}}` are
    /// placeholders the rotator fills in.
    #[serde(default)]
    pub commands: Vec<String>,
}

/// The principal whose credentials are being set.
#[derive(Clone, Serialize, Deserialize)]
pub struct StaticUserConfig {
    /// Existing account name.
    pub username: String,
    /// Password to set.
    pub password: String,
    /// When the credentials stop being valid, if the backend supports it.
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

impl fmt::Debug for StaticUserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticUserConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Credentials in effect after a successful rotation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Password now set on the remote system.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
