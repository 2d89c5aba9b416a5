//! Session task: request scheduling, response dispatch, connection lifecycle.
//!
//! One task owns the queue, the active-request slot, the socket, and all
//! reassembly/demux state, so every transition (enqueue, dispatch,
//! frame-received, complete, disconnect) is serialized. That serialization
//! is what upholds the one-in-flight invariant: a request is written to the
//! wire only from `dispatch_next_if_idle`, and that runs only when the
//! active slot is empty.

use crate::connection::{ClientConfig, ConnectionManager};
use crate::demux::{DeliveryMode, Demultiplexer, Step};
use crate::error::ClientError;
use crate::transport::Transport;
use bytes::Bytes;
use kvwire_protocol::{Codec, FrameReassembler};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Socket read buffer size (8 KiB).
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Where a request's reply goes. Exactly one variant per request; the
/// variant is fixed at submission and inspected once per delivery point.
pub(crate) enum Consumer {
    /// One merged result (or one error).
    Callback(oneshot::Sender<Result<Value, ClientError>>),
    /// A live sequence of partial results.
    Stream(mpsc::Sender<Result<Value, ClientError>>),
}

impl Consumer {
    pub(crate) fn mode(&self) -> DeliveryMode {
        match self {
            Consumer::Callback(_) => DeliveryMode::Buffered,
            Consumer::Stream(_) => DeliveryMode::Streaming,
        }
    }

    /// Delivers one partial result to a streaming consumer. Suspends while
    /// the consumer is not ready; a dropped receiver discards the item.
    async fn deliver(&self, item: Value) {
        if let Consumer::Stream(tx) = self {
            let _ = tx.send(Ok(item)).await;
        }
    }

    /// Completes the request successfully. For streams this ends the stream.
    async fn succeed(self, merged: Value) {
        match self {
            Consumer::Callback(tx) => {
                let _ = tx.send(Ok(merged));
            }
            Consumer::Stream(tx) => drop(tx),
        }
    }

    /// Completes the request with an error. Streams receive the error as a
    /// final item, then end.
    async fn fail(self, err: ClientError) {
        match self {
            Consumer::Callback(tx) => {
                let _ = tx.send(Err(err));
            }
            Consumer::Stream(tx) => {
                let _ = tx.send(Err(err)).await;
            }
        }
    }
}

/// One caller request: framed bytes plus the consumer awaiting the reply.
pub(crate) struct PendingRequest {
    /// Fully framed message (length prefix + type code + payload).
    pub(crate) message: Bytes,
    pub(crate) consumer: Consumer,
    /// True only for operations defined to reply with zero-or-more
    /// intermediate frames followed by a terminal frame.
    pub(crate) expects_multiple: bool,
}

/// Commands from the client facade to the session task.
pub(crate) enum Command {
    Request(PendingRequest),
    Connect(oneshot::Sender<Result<(), ClientError>>),
    Disconnect(oneshot::Sender<()>),
}

pub(crate) struct Session<T: Transport> {
    conn: ConnectionManager<T>,
    queue: VecDeque<PendingRequest>,
    active: Option<PendingRequest>,
    reassembler: FrameReassembler,
    demux: Demultiplexer,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    auto_connect: bool,
}

impl<T: Transport> Session<T> {
    pub(crate) fn new(
        transport: T,
        config: &ClientConfig,
        codec: Arc<dyn Codec>,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            conn: ConnectionManager::new(transport, config.connect_timeout),
            queue: VecDeque::new(),
            active: None,
            reassembler: FrameReassembler::new(),
            demux: Demultiplexer::new(codec),
            cmd_rx,
            auto_connect: config.auto_connect,
        }
    }

    pub(crate) fn connected_flag(&self) -> Arc<std::sync::atomic::AtomicBool> {
        self.conn.connected_flag()
    }

    /// Runs until the client facade is dropped.
    pub(crate) async fn run(mut self) {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            if self.conn.is_connected() {
                tokio::select! {
                    cmd = self.cmd_rx.recv() => match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => break,
                    },
                    res = self.conn.read(&mut buf) => {
                        self.handle_read(res, &buf).await;
                    }
                }
            } else {
                match self.cmd_rx.recv().await {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                }
            }
        }

        self.shutdown().await;
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Request(request) => {
                self.queue.push_back(request);
                self.dispatch_next_if_idle().await;
            }
            Command::Connect(ack) => {
                let result = self.conn.connect().await;
                let connected = result.is_ok();
                let _ = ack.send(result);
                // An explicit connect is the retry trigger for a previously
                // requeued request.
                if connected {
                    self.dispatch_next_if_idle().await;
                }
            }
            Command::Disconnect(ack) => {
                self.disconnect_and_requeue().await;
                let _ = ack.send(());
            }
        }
    }

    async fn handle_read(&mut self, res: Result<usize, ClientError>, buf: &[u8]) {
        match res {
            Ok(0) => {
                tracing::debug!("connection closed by peer");
                self.disconnect_and_requeue().await;
            }
            Ok(n) => match self.reassembler.feed(&buf[..n]) {
                Ok(frames) => {
                    for frame in frames {
                        self.on_frame(frame).await;
                        if !self.conn.is_connected() {
                            break;
                        }
                    }
                }
                Err(err) => {
                    tracing::error!(%err, "framing error");
                    self.disconnect_and_requeue().await;
                }
            },
            Err(err) => {
                tracing::debug!(%err, "socket error");
                self.disconnect_and_requeue().await;
            }
        }
    }

    /// Handles one complete response frame.
    async fn on_frame(&mut self, frame: kvwire_protocol::Frame) {
        let (mode, expects_multiple) = match &self.active {
            Some(request) => (request.consumer.mode(), request.expects_multiple),
            None => {
                // A frame with no active request means framing state and the
                // server disagree about where we are in the exchange. There
                // is no consumer to hand it to; the connection is unusable.
                tracing::error!(code = frame.code, "response frame with no active request");
                self.disconnect_and_requeue().await;
                return;
            }
        };

        match self.demux.absorb(&frame, mode, expects_multiple) {
            Step::Continue { item } => {
                if let Some(item) = item {
                    if let Some(request) = &self.active {
                        request.consumer.deliver(item).await;
                    }
                }
            }
            Step::Complete { item, merged } => {
                let Some(request) = self.active.take() else {
                    return;
                };
                if let Some(item) = item {
                    request.consumer.deliver(item).await;
                }
                tracing::debug!("request complete");
                request.consumer.succeed(merged).await;
                self.demux.reset();
                self.dispatch_next_if_idle().await;
            }
            Step::Fail(err) => {
                let Some(request) = self.active.take() else {
                    return;
                };
                tracing::debug!(%err, "request failed");
                request.consumer.fail(err).await;
                self.demux.reset();
                self.dispatch_next_if_idle().await;
            }
        }
    }

    /// Dispatches the queue head if no request is in flight.
    ///
    /// A request whose dispatch fails (connect refused, timed out, write
    /// error, or auto-connect disabled while disconnected) is completed with
    /// that error and the loop advances, so one bad dispatch never wedges
    /// the queue.
    async fn dispatch_next_if_idle(&mut self) {
        while self.active.is_none() {
            let Some(request) = self.queue.pop_front() else {
                return;
            };

            if !self.conn.is_connected() {
                if !self.auto_connect {
                    request.consumer.fail(ClientError::NotConnected).await;
                    continue;
                }
                if let Err(err) = self.conn.connect().await {
                    request.consumer.fail(err).await;
                    continue;
                }
            }

            match self.conn.write(&request.message).await {
                Ok(()) => {
                    tracing::debug!(bytes = request.message.len(), "request dispatched");
                    self.active = Some(request);
                }
                Err(err) => {
                    self.conn.disconnect().await;
                    request.consumer.fail(err).await;
                }
            }
        }
    }

    /// Tears down the connection and puts an interrupted active request
    /// back at the front of the queue, consumer intact, for redelivery on
    /// the next dispatch trigger. Idempotent; never auto-redispatches.
    async fn disconnect_and_requeue(&mut self) {
        self.conn.disconnect().await;
        self.reassembler.reset();
        self.demux.reset();
        if let Some(request) = self.active.take() {
            tracing::debug!("requeueing interrupted request");
            self.queue.push_front(request);
        }
    }

    /// Final teardown when the facade is dropped: no consumer is left
    /// waiting forever.
    async fn shutdown(mut self) {
        self.conn.disconnect().await;
        if let Some(request) = self.active.take() {
            request.consumer.fail(ClientError::Closed).await;
        }
        while let Some(request) = self.queue.pop_front() {
            request.consumer.fail(ClientError::Closed).await;
        }
    }
}
