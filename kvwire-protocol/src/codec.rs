//! Message codec: type-name ↔ code mapping and payload translation.
//!
//! The transport layer never inspects payload bytes; everything it needs to
//! know about a message type comes through the [`Codec`] trait. The default
//! [`JsonCodec`] carries parameters and results as JSON objects; a
//! schema-aware codec (e.g. protocol buffers) plugs in behind the same
//! trait without touching the session layer.

use crate::error::ProtocolError;
use bytes::Bytes;
use serde_json::Value;

/// Type name of the designated error-response message.
pub const ERROR_RESP: &str = "ErrorResp";

/// Translates between message-type names, numeric wire codes, and payload
/// bytes.
pub trait Codec: Send + Sync {
    /// Wire code for a message-type name.
    fn code_for(&self, type_name: &str) -> Option<u8>;

    /// Message-type name for a wire code.
    fn type_for(&self, code: u8) -> Option<&str>;

    /// Whether responses to this request type arrive as zero-or-more
    /// intermediate frames followed by a terminal frame, rather than as a
    /// single frame.
    fn streams_response(&self, type_name: &str) -> bool;

    /// Encodes structured parameters into payload bytes. `None` encodes to
    /// an empty payload (parameterless message types).
    fn encode(&self, type_name: &str, params: Option<&Value>) -> Result<Bytes, ProtocolError>;

    /// Decodes payload bytes into a structured value.
    fn decode(&self, type_name: &str, payload: &[u8]) -> Result<Value, ProtocolError>;
}

/// One row of the message-type table.
struct MessageType {
    name: &'static str,
    code: u8,
    /// True for request types whose reply spans multiple frames.
    multi_frame: bool,
}

const fn single(name: &'static str, code: u8) -> MessageType {
    MessageType {
        name,
        code,
        multi_frame: false,
    }
}

const fn multi(name: &'static str, code: u8) -> MessageType {
    MessageType {
        name,
        code,
        multi_frame: true,
    }
}

/// Wire-exact message-type table. Codes are part of the protocol contract
/// and must remain stable.
const MESSAGE_TABLE: &[MessageType] = &[
    single(ERROR_RESP, 0),
    single("PingReq", 1),
    single("PingResp", 2),
    single("GetClientIdReq", 3),
    single("GetClientIdResp", 4),
    single("SetClientIdReq", 5),
    single("SetClientIdResp", 6),
    single("GetServerInfoReq", 7),
    single("GetServerInfoResp", 8),
    single("GetReq", 9),
    single("GetResp", 10),
    single("PutReq", 11),
    single("PutResp", 12),
    single("DelReq", 13),
    single("DelResp", 14),
    single("ListBucketsReq", 15),
    single("ListBucketsResp", 16),
    multi("ListKeysReq", 17),
    single("ListKeysResp", 18),
    single("GetBucketReq", 19),
    single("GetBucketResp", 20),
    single("SetBucketReq", 21),
    single("SetBucketResp", 22),
    multi("MapRedReq", 23),
    single("MapRedResp", 24),
    multi("IndexReq", 25),
    single("IndexResp", 26),
    single("SearchQueryReq", 27),
    single("SearchQueryResp", 28),
    single("ResetBucketReq", 29),
    single("ResetBucketResp", 30),
    single("CounterUpdateReq", 50),
    single("CounterUpdateResp", 51),
    single("CounterGetReq", 52),
    single("CounterGetResp", 53),
];

fn lookup_name(type_name: &str) -> Option<&'static MessageType> {
    MESSAGE_TABLE.iter().find(|m| m.name == type_name)
}

fn lookup_code(code: u8) -> Option<&'static MessageType> {
    MESSAGE_TABLE.iter().find(|m| m.code == code)
}

/// Default codec: payloads are JSON objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn code_for(&self, type_name: &str) -> Option<u8> {
        lookup_name(type_name).map(|m| m.code)
    }

    fn type_for(&self, code: u8) -> Option<&str> {
        lookup_code(code).map(|m| m.name)
    }

    fn streams_response(&self, type_name: &str) -> bool {
        lookup_name(type_name).is_some_and(|m| m.multi_frame)
    }

    fn encode(&self, type_name: &str, params: Option<&Value>) -> Result<Bytes, ProtocolError> {
        if lookup_name(type_name).is_none() {
            return Err(ProtocolError::UnknownMessageType(type_name.to_string()));
        }
        match params {
            Some(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
            None => Ok(Bytes::new()),
        }
    }

    fn decode(&self, type_name: &str, payload: &[u8]) -> Result<Value, ProtocolError> {
        if lookup_name(type_name).is_none() {
            return Err(ProtocolError::UnknownMessageType(type_name.to_string()));
        }
        if payload.is_empty() {
            // Parameterless responses (e.g. PingResp) have no payload.
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_code_table_is_bijective() {
        for row in MESSAGE_TABLE {
            let codec = JsonCodec::new();
            assert_eq!(codec.code_for(row.name), Some(row.code));
            assert_eq!(codec.type_for(row.code), Some(row.name));
        }
    }

    #[test]
    fn test_error_resp_is_code_zero() {
        assert_eq!(JsonCodec::new().code_for(ERROR_RESP), Some(0));
    }

    #[test]
    fn test_multi_frame_request_types() {
        let codec = JsonCodec::new();
        assert!(codec.streams_response("ListKeysReq"));
        assert!(codec.streams_response("MapRedReq"));
        assert!(codec.streams_response("IndexReq"));
        assert!(!codec.streams_response("GetReq"));
        assert!(!codec.streams_response("PingReq"));
        assert!(!codec.streams_response("NoSuchReq"));
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let codec = JsonCodec::new();
        let params = json!({"bucket": "users", "key": "u1"});
        let payload = codec.encode("GetReq", Some(&params)).unwrap();
        let decoded = codec.decode("GetReq", &payload).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_encode_none_is_empty() {
        let payload = JsonCodec::new().encode("PingReq", None).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_decode_empty_payload() {
        let decoded = JsonCodec::new().decode("PingResp", b"").unwrap();
        assert_eq!(decoded, json!({}));
    }

    #[test]
    fn test_unknown_type_name() {
        let codec = JsonCodec::new();
        assert!(codec.code_for("Bogus").is_none());
        assert!(matches!(
            codec.encode("Bogus", None),
            Err(ProtocolError::UnknownMessageType(_))
        ));
    }

    #[test]
    fn test_unknown_code() {
        assert!(JsonCodec::new().type_for(200).is_none());
    }

    #[test]
    fn test_decode_malformed_payload() {
        let result = JsonCodec::new().decode("GetResp", b"not json");
        assert!(matches!(result, Err(ProtocolError::Json(_))));
    }
}
