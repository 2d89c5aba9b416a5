//! Protocol error types.

use thiserror::Error;

/// Errors raised while framing or translating messages.
///
/// Framing variants (`InvalidLength`, `FrameTooLarge`) indicate a corrupted
/// byte stream and are fatal to the connection that produced them. Codec
/// variants (`UnknownMessageType`, `UnknownMessageCode`, `Json`) only concern
/// a single message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid frame length {0}: must include the type code byte")]
    InvalidLength(u32),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("unknown message code: {0}")]
    UnknownMessageCode(u8),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Returns whether this error invalidates the whole byte stream rather
    /// than just the message that produced it.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidLength(_) | ProtocolError::FrameTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_classification() {
        assert!(ProtocolError::InvalidLength(0).is_framing());
        assert!(ProtocolError::FrameTooLarge { size: 2, max: 1 }.is_framing());
        assert!(!ProtocolError::UnknownMessageCode(99).is_framing());
        assert!(!ProtocolError::UnknownMessageType("Nope".into()).is_framing());
    }

    #[test]
    fn test_display() {
        let err = ProtocolError::UnknownMessageCode(42);
        assert!(err.to_string().contains("42"));

        let err = ProtocolError::FrameTooLarge { size: 100, max: 50 };
        assert!(err.to_string().contains("100"));
    }
}
