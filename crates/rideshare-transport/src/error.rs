//! Transport error types.

use thiserror::Error;

/// Errors while reading environment configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// The raw value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

/// Errors raised while running a service listener.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address.
        addr: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The server loop failed.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised by outbound RPC calls before a status is available.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The target URL is not a valid endpoint.
    #[error("invalid service url {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Connecting to the service failed.
    #[error("could not connect to {url}: {reason}")]
    Connect {
        /// Target URL.
        url: String,
        /// Transport message.
        reason: String,
    },

    /// The service answered with a non-OK status.
    #[error("{}", .0.message())]
    Status(#[from] tonic::Status),
}

impl RpcError {
    /// The status code for this error. Connection problems are `Unavailable`.
    #[must_use]
    pub fn code(&self) -> tonic::Code {
        match self {
            Self::InvalidUrl { .. } => tonic::Code::Internal,
            Self::Connect { .. } => tonic::Code::Unavailable,
            Self::Status(status) => status.code(),
        }
    }
}
