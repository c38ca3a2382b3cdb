//! Error types for `credlink-core`.
//!
//! Each error variant carries enough context to tell a configuration-time
//! failure apart from a connection-time one. No variant ever carries the api
//! token or a principal's password.

/// Coarse classification of a [`ProducerError`], stable across releases.
///
/// Hosts map these onto their own request/response failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The config payload could not be coerced into the expected shape.
    ConfigDecodeError,
    /// A required config field is empty or malformed after decoding.
    InvalidConfig,
    /// An operation was attempted before a successful initialize.
    NotInitialized,
    /// The remote system could not be reached or refused the connection.
    ConnectionFailed,
    /// Connection verification failed during initialize.
    ConnectionVerificationFailed,
    /// The backend does not support the requested operation.
    NotImplemented,
    /// The request itself is malformed (e.g. an empty username).
    InvalidRequest,
    /// The remote system rejected or failed a credential rotation.
    CredentialRotationFailed,
}

/// Errors from dialing the remote credential-issuing system.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The HTTP client could not be constructed.
    #[error("failed to build client: {reason}")]
    Client { reason: String },

    /// Transport-level failure talking to the remote system.
    #[error("network error communicating with {endpoint}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The remote system rejected the api token.
    #[error("remote system rejected the api token (status {status})")]
    Unauthorized { status: u16 },

    /// The remote system answered with a status we do not treat as success.
    #[error("unexpected response from remote system: status {status}")]
    UnexpectedStatus { status: u16 },

    /// The dial did not complete within the configured timeout.
    #[error("connection attempt timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Backend-specific dial failure.
    #[error("{reason}")]
    Other { reason: String },
}

/// Errors reported by a credential rotator.
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    /// The remote system refused the change. Remote state is unchanged.
    #[error("rotation rejected: {reason}")]
    Rejected { reason: String },

    /// The connection broke mid-rotation. The cached handle must be dropped.
    #[error("connection lost during rotation: {reason}")]
    ConnectionLost { reason: String },
}

/// Errors from [`ConnectionProducer`](crate::producer::ConnectionProducer) operations.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// A config field has a shape that weak coercion cannot fix.
    #[error("failed to decode config field '{field}': {reason}")]
    ConfigDecode { field: &'static str, reason: String },

    /// A required field is missing, empty, or malformed.
    #[error("{field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// The producer has not been initialized with a valid config.
    #[error("connection producer not initialized")]
    NotInitialized,

    /// Establishing a connection to the remote system failed.
    #[error("failed to connect: {0}")]
    ConnectionFailed(#[source] ConnectError),

    /// The connection check requested by initialize failed.
    #[error("error verifying connection: {0}")]
    VerificationFailed(#[source] ConnectError),

    /// The backend does not implement this operation.
    #[error("{operation} is not implemented by this backend")]
    NotImplemented { operation: &'static str },

    /// The request arguments are unusable.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The remote rotation call failed.
    #[error("failed to set credentials for '{username}': {source}")]
    CredentialRotation {
        username: String,
        #[source]
        source: RotationError,
    },
}

impl ProducerError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigDecode { .. } => ErrorKind::ConfigDecodeError,
            Self::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            Self::VerificationFailed(_) => ErrorKind::ConnectionVerificationFailed,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::CredentialRotation { .. } => ErrorKind::CredentialRotationFailed,
        }
    }

    /// Whether retrying the same call without changing the config may succeed.
    ///
    /// Only connection-time failures qualify. The core never retries on its
    /// own; this is a hint for the host.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::VerificationFailed(_) => true,
            Self::CredentialRotation { source, .. } => {
                matches!(source, RotationError::ConnectionLost { .. })
            }
            _ => false,
        }
    }
}
