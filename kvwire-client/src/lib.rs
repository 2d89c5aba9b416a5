//! # kvwire-client
//!
//! Async client for the kvwire protocol.
//!
//! This crate provides:
//! - A single persistent TCP connection with connect-timeout and lazy
//!   auto-connect
//! - A FIFO request queue with exactly one request in flight at a time
//! - Merged (`call`) and streaming (`call_streaming`) reply delivery
//! - Automatic requeueing of a request interrupted by disconnect

pub mod client;
pub mod connection;
pub mod error;
pub mod stream;
pub mod transport;

mod demux;
mod session;

pub use client::Client;
pub use connection::ClientConfig;
pub use error::ClientError;
pub use stream::ReplyStream;
pub use transport::{TcpTransport, Transport};
