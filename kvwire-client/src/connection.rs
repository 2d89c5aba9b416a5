//! Connection configuration and management.

use crate::error::ClientError;
use crate::transport::Transport;
use kvwire_protocol::DEFAULT_PORT;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Default connect timeout (1 second).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Connect lazily on the first request instead of requiring an explicit
    /// `connect()`.
    pub auto_connect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auto_connect: true,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }
}

/// Owns the byte stream to the server.
///
/// The session task is the only caller, so connect/disconnect/write/read are
/// strictly serialized and no locking is needed around the stream.
pub(crate) struct ConnectionManager<T: Transport> {
    transport: T,
    stream: Option<T::Stream>,
    connect_timeout: Duration,
    connected: Arc<AtomicBool>,
}

impl<T: Transport> ConnectionManager<T> {
    pub(crate) fn new(transport: T, connect_timeout: Duration) -> Self {
        Self {
            transport,
            stream: None,
            connect_timeout,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag mirroring the connection state, for `Client::is_connected`.
    pub(crate) fn connected_flag(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Opens the stream if it is not already open. Idempotent: an open
    /// connection returns success immediately without a second attempt.
    pub(crate) async fn connect(&mut self) -> Result<(), ClientError> {
        if self.stream.is_some() {
            return Ok(());
        }

        tracing::debug!("connecting...");
        let stream = tokio::time::timeout(self.connect_timeout, self.transport.connect())
            .await
            .map_err(|_| {
                tracing::debug!("connect timed out");
                ClientError::ConnectTimeout
            })?
            .map_err(|err| {
                tracing::debug!(%err, "connect failed");
                ClientError::Io(err)
            })?;

        self.stream = Some(stream);
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!("connected");
        Ok(())
    }

    /// Closes the stream. Idempotent: a no-op while disconnected.
    pub(crate) async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!("disconnecting");
            let _ = stream.shutdown().await;
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Writes an already-framed message to the stream.
    pub(crate) async fn write(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Reads a chunk from the stream. `Ok(0)` signals end of stream.
    pub(crate) async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        Ok(stream.read(buf).await?)
    }
}
