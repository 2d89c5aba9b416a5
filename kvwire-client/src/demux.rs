//! Response demultiplexer: decode, merge, and completion detection.

use crate::error::ClientError;
use kvwire_protocol::{merge, Codec, Frame, ERROR_RESP};
use serde_json::Value;
use std::sync::Arc;

/// How the active request's consumer wants its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeliveryMode {
    /// Merge every frame; deliver one aggregate value at completion.
    Buffered,
    /// Deliver each frame's value as it arrives; nothing is aggregated.
    Streaming,
}

/// Outcome of absorbing one frame.
#[derive(Debug)]
pub(crate) enum Step {
    /// More frames are expected. `item` carries a streaming partial result,
    /// if this frame produced one.
    Continue { item: Option<Value> },
    /// The active request is complete. `item` carries a final streaming
    /// partial result; `merged` is the aggregate for buffered consumers.
    Complete { item: Option<Value>, merged: Value },
    /// The active request failed. Later frames of this reply, if any, no
    /// longer have a consumer.
    Fail(ClientError),
}

/// Decodes frames for the active request and applies the merge/termination
/// policy. Owns the accumulated reply for the lifetime of that request.
pub(crate) struct Demultiplexer {
    codec: Arc<dyn Codec>,
    reply: Value,
}

impl Demultiplexer {
    pub(crate) fn new(codec: Arc<dyn Codec>) -> Self {
        Self {
            codec,
            reply: empty_reply(),
        }
    }

    /// Absorbs one complete frame belonging to the active request.
    ///
    /// Terminal conditions, checked per frame: the decoded value's `done`
    /// marker, a single-frame protocol (`expects_multiple` false), or the
    /// designated error-response type.
    pub(crate) fn absorb(
        &mut self,
        frame: &Frame,
        mode: DeliveryMode,
        expects_multiple: bool,
    ) -> Step {
        let type_name = match self.codec.type_for(frame.code) {
            Some(name) => name.to_string(),
            None => {
                return Step::Fail(ClientError::Protocol(
                    kvwire_protocol::ProtocolError::UnknownMessageCode(frame.code),
                ))
            }
        };

        let mut decoded = match self.codec.decode(&type_name, &frame.payload) {
            Ok(value) => value,
            Err(err) => return Step::Fail(err.into()),
        };

        // An error-carrying response terminates the request no matter how
        // many frames were expected.
        if let Some(message) = decoded.get("errmsg").and_then(Value::as_str) {
            let code = decoded
                .get("errcode")
                .and_then(Value::as_u64)
                .map_or(0, |raw| u32::try_from(raw).unwrap_or(u32::MAX));
            return Step::Fail(ClientError::Server {
                code,
                message: message.to_string(),
            });
        }

        let done = decoded
            .get("done")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if let Value::Object(map) = &mut decoded {
            // The terminal marker is transport metadata, never result data.
            map.remove("done");
        }

        let complete = done || !expects_multiple || type_name == ERROR_RESP;

        match mode {
            DeliveryMode::Buffered => {
                self.reply = merge(std::mem::replace(&mut self.reply, Value::Null), decoded);
                if complete {
                    let merged = std::mem::replace(&mut self.reply, empty_reply());
                    Step::Complete { item: None, merged }
                } else {
                    Step::Continue { item: None }
                }
            }
            DeliveryMode::Streaming => {
                let item = non_empty(decoded);
                if complete {
                    Step::Complete {
                        item,
                        merged: Value::Null,
                    }
                } else {
                    Step::Continue { item }
                }
            }
        }
    }

    /// Discards accumulated state. Called whenever the active request ends.
    pub(crate) fn reset(&mut self) {
        self.reply = empty_reply();
    }
}

fn empty_reply() -> Value {
    Value::Object(Default::default())
}

/// A frame that carried nothing but the terminal marker produces no
/// streaming item.
fn non_empty(value: Value) -> Option<Value> {
    match &value {
        Value::Object(map) if map.is_empty() => None,
        _ => Some(value),
    }
}
