//! Gateway errors - error taxonomy shared by the connection, REST, and store layers

use std::time::Duration;

use thiserror::Error;

/// Client-wide error type
///
/// Connection-fatal variants propagate to the supervisor, which decides
/// how long to wait before reconnecting. REST variants return to the
/// caller after bounded internal retries.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The server violated the wire protocol
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The connection went silent (heartbeat never acknowledged)
    #[error("Connection liveness lost: {0}")]
    Liveness(String),

    /// The server told us to back off
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Socket-level failure (dial, read, write, TLS)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The operation was abandoned because the client is shutting down
    #[error("Operation canceled")]
    Canceled,

    /// A REST call kept failing with retryable statuses
    #[error("{route} failed after {attempts} attempts")]
    MaxRetriesExceeded { route: &'static str, attempts: u32 },

    /// The API answered with a status the client has no handling for
    #[error("Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    /// The requested resource does not exist
    #[error("Resource not found")]
    NotFound,

    /// The session or outgoing store failed
    #[error("Store error: {0}")]
    Store(String),

    /// The client was started with unusable settings
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Check if this error means the connection itself is unusable
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::Liveness(_) | Self::Transport(_)
        )
    }
}
