//! Core library for `credlink`.
//!
//! Contains the connection producer that manages configuration, connection,
//! and credential rotation for a single secrets-engine backend, along with
//! the weak config decoder, the connector traits it dials through, and an
//! HTTP connector for token-authenticated APIs. Hosting, RPC transport, and
//! lease bookkeeping belong to the embedding platform.

pub mod config;
pub mod connector;
mod decode;
pub mod error;
pub mod http;
pub mod producer;
pub mod redact;
pub mod settings;

pub use config::ConnectionConfig;
pub use connector::{Connector, CredentialRotator, Credentials, Statements, StaticUserConfig};
pub use error::{ConnectError, ErrorKind, ProducerError, RotationError};
pub use http::{HttpConnection, HttpConnector};
pub use producer::ConnectionProducer;
pub use settings::ProducerSettings;
