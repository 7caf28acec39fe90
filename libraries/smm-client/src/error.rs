//! Error types for the smm server client.

use thiserror::Error;

/// Errors that can occur when talking to an smm server.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Connection failed or timed out (after the single retry), or the
    /// body could not be read to the end.
    #[error("Network error on '{resource}': {source}")]
    Network {
        resource: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server returned a non-success status
    #[error("Server error ({status}) on '{resource}': {message}")]
    Server {
        resource: String,
        status: u16,
        message: String,
    },

    /// Response violated the wire protocol (bad `Content-Length`, bad path)
    #[error("Protocol error on '{resource}': {message}")]
    Protocol { resource: String, message: String },

    /// Downloaded byte count differs from the declared length.
    ///
    /// Never returned by the fetcher; it is logged and the partial file kept.
    #[error("Downloading '{resource}': got {actual} bytes, expecting {expected}")]
    DataIntegrity {
        resource: String,
        expected: u64,
        actual: u64,
    },

    /// Local file could not be created or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid server address
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Whether the caller should try the same work again on the next cycle.
    ///
    /// Connection failures and 5xx responses are transient; protocol
    /// violations and 4xx responses will not improve on retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::Network { .. } => true,
            ClientError::Server { status, .. } => *status >= 500,
            ClientError::Io(_) => true,
            ClientError::Protocol { .. }
            | ClientError::DataIntegrity { .. }
            | ClientError::InvalidUrl(_) => false,
        }
    }

    pub(crate) fn network(resource: &str, source: reqwest::Error) -> Self {
        ClientError::Network {
            resource: resource.to_string(),
            source,
        }
    }

    pub(crate) fn protocol(resource: &str, message: impl Into<String>) -> Self {
        ClientError::Protocol {
            resource: resource.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
