//! Transport seam between the connection manager and the network.
//!
//! Production code connects real TCP sockets; tests substitute in-memory
//! duplex pipes so the whole session layer runs without a listener.

use std::future::Future;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Opens the byte stream the connection manager owns.
pub trait Transport: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Opens a fresh stream to the peer. Called once per (re)connection;
    /// the connect timeout is applied by the caller.
    fn connect(&mut self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// TCP transport to a `host:port` address.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    addr: String,
}

impl TcpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn connect(&mut self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true).ok();
        Ok(stream)
    }
}
