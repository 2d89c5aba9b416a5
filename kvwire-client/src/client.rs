//! High-level client API.

use crate::connection::ClientConfig;
use crate::error::ClientError;
use crate::session::{Command, Consumer, PendingRequest, Session};
use crate::stream::{self, ReplyStream};
use crate::transport::TcpTransport;
use bytes::Bytes;
use kvwire_protocol::{Codec, Frame, JsonCodec};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Client for a kvwire server over a single persistent TCP connection.
///
/// Requests are queued and sent one at a time in submission order. Dropping
/// the client tears down the connection and fails any waiting requests.
///
/// Must be created inside a Tokio runtime (it spawns the session task).
pub struct Client {
    cmd_tx: mpsc::UnboundedSender<Command>,
    codec: Arc<dyn Codec>,
    connected: Arc<AtomicBool>,
}

impl Client {
    /// Creates a client with the default JSON codec.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_codec(config, Arc::new(JsonCodec::new()))
    }

    /// Creates a client with a custom message codec.
    pub fn with_codec(config: ClientConfig, codec: Arc<dyn Codec>) -> Self {
        let transport = TcpTransport::new(&config.host, config.port);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let session = Session::new(transport, &config, codec.clone(), cmd_rx);
        let connected = session.connected_flag();
        tokio::spawn(session.run());
        Self {
            cmd_tx,
            codec,
            connected,
        }
    }

    /// Connects to the server. Idempotent; a no-op while connected. Also
    /// retries a request that was requeued by a disconnect.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Connect(tx))
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Disconnects from the server. Idempotent. A request awaiting its
    /// reply is requeued at the front of the queue for the next dispatch
    /// cycle, not lost.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Disconnect(tx))
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Returns whether the connection is currently established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Sends one request and waits for its reply; multi-frame replies are
    /// merged into a single result.
    pub async fn call(
        &self,
        type_name: &str,
        params: Option<Value>,
    ) -> Result<Value, ClientError> {
        let message = self.encode_message(type_name, params.as_ref())?;
        let (tx, rx) = oneshot::channel();
        self.enqueue(message, Consumer::Callback(tx), type_name)?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Sends one request and returns a live stream of partial results.
    pub fn call_streaming(
        &self,
        type_name: &str,
        params: Option<Value>,
    ) -> Result<ReplyStream, ClientError> {
        let message = self.encode_message(type_name, params.as_ref())?;
        let (tx, reply) = stream::channel();
        self.enqueue(message, Consumer::Stream(tx), type_name)?;
        Ok(reply)
    }

    fn encode_message(
        &self,
        type_name: &str,
        params: Option<&Value>,
    ) -> Result<Bytes, ClientError> {
        let code = self.codec.code_for(type_name).ok_or_else(|| {
            kvwire_protocol::ProtocolError::UnknownMessageType(type_name.to_string())
        })?;
        let payload = self.codec.encode(type_name, params)?;
        Ok(Frame::new(code, payload).encode()?.freeze())
    }

    fn enqueue(
        &self,
        message: Bytes,
        consumer: Consumer,
        type_name: &str,
    ) -> Result<(), ClientError> {
        self.cmd_tx
            .send(Command::Request(PendingRequest {
                message,
                consumer,
                expects_multiple: self.codec.streams_response(type_name),
            }))
            .map_err(|_| ClientError::Closed)
    }

    // =========================================================================
    // Server operations
    // =========================================================================

    /// Pings the server.
    pub async fn ping(&self) -> Result<(), ClientError> {
        self.call("PingReq", None).await?;
        Ok(())
    }

    /// Gets server name and version info.
    pub async fn server_info(&self) -> Result<Value, ClientError> {
        self.call("GetServerInfoReq", None).await
    }

    /// Gets the client id registered on this connection.
    pub async fn get_client_id(&self) -> Result<Value, ClientError> {
        self.call("GetClientIdReq", None).await
    }

    /// Sets the client id for this connection.
    pub async fn set_client_id(&self, params: Value) -> Result<Value, ClientError> {
        self.call("SetClientIdReq", Some(params)).await
    }

    // =========================================================================
    // Object operations
    // =========================================================================

    /// Fetches an object.
    pub async fn get(&self, params: Value) -> Result<Value, ClientError> {
        self.call("GetReq", Some(params)).await
    }

    /// Stores an object.
    pub async fn put(&self, params: Value) -> Result<Value, ClientError> {
        self.call("PutReq", Some(params)).await
    }

    /// Deletes an object.
    pub async fn del(&self, params: Value) -> Result<Value, ClientError> {
        self.call("DelReq", Some(params)).await
    }

    // =========================================================================
    // Bucket operations
    // =========================================================================

    /// Lists all buckets.
    pub async fn list_buckets(&self) -> Result<Value, ClientError> {
        self.call("ListBucketsReq", None).await
    }

    /// Lists keys in a bucket, merged into one reply.
    pub async fn list_keys(&self, params: Value) -> Result<Value, ClientError> {
        self.call("ListKeysReq", Some(params)).await
    }

    /// Lists keys in a bucket as a stream of key pages.
    pub fn list_keys_stream(&self, params: Value) -> Result<ReplyStream, ClientError> {
        self.call_streaming("ListKeysReq", Some(params))
    }

    /// Gets bucket properties.
    pub async fn get_bucket(&self, params: Value) -> Result<Value, ClientError> {
        self.call("GetBucketReq", Some(params)).await
    }

    /// Sets bucket properties.
    pub async fn set_bucket(&self, params: Value) -> Result<Value, ClientError> {
        self.call("SetBucketReq", Some(params)).await
    }

    /// Resets bucket properties to defaults.
    pub async fn reset_bucket(&self, params: Value) -> Result<Value, ClientError> {
        self.call("ResetBucketReq", Some(params)).await
    }

    // =========================================================================
    // Query operations
    // =========================================================================

    /// Runs a map-reduce job, phases merged into one reply.
    pub async fn mapred(&self, params: Value) -> Result<Value, ClientError> {
        self.call("MapRedReq", Some(params)).await
    }

    /// Runs a map-reduce job as a stream of phase results.
    pub fn mapred_stream(&self, params: Value) -> Result<ReplyStream, ClientError> {
        self.call_streaming("MapRedReq", Some(params))
    }

    /// Queries a secondary index, merged into one reply. The server streams
    /// index results, so the `stream` parameter is always set.
    pub async fn index(&self, params: Value) -> Result<Value, ClientError> {
        self.call("IndexReq", Some(streamed(params))).await
    }

    /// Queries a secondary index as a stream of result pages.
    pub fn index_stream(&self, params: Value) -> Result<ReplyStream, ClientError> {
        self.call_streaming("IndexReq", Some(streamed(params)))
    }

    /// Runs a full-text search query.
    pub async fn search(&self, params: Value) -> Result<Value, ClientError> {
        self.call("SearchQueryReq", Some(params)).await
    }

    // =========================================================================
    // Counter operations
    // =========================================================================

    /// Fetches a counter value.
    pub async fn counter_get(&self, params: Value) -> Result<Value, ClientError> {
        self.call("CounterGetReq", Some(params)).await
    }

    /// Increments or decrements a counter.
    pub async fn counter_update(&self, params: Value) -> Result<Value, ClientError> {
        self.call("CounterUpdateReq", Some(params)).await
    }
}

fn streamed(mut params: Value) -> Value {
    if let Value::Object(map) = &mut params {
        map.insert("stream".to_string(), Value::Bool(true));
    }
    params
}
