//! Client error types.

use kvwire_protocol::ProtocolError;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connect timeout")]
    ConnectTimeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("client closed")]
    Closed,

    #[error("server error {code}: {message}")]
    Server { code: u32, message: String },
}

impl ClientError {
    /// Returns whether retrying the request on a fresh connection could
    /// succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::ConnectTimeout
                | ClientError::ConnectionClosed
                | ClientError::NotConnected
        )
    }
}
