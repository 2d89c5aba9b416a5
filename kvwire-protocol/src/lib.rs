//! # kvwire-protocol
//!
//! Wire protocol for kvwire clients.
//!
//! This crate provides:
//! - Length-prefixed, type-tagged binary framing
//! - Reassembly of frames from arbitrary socket chunk boundaries
//! - The [`Codec`] trait mapping message-type names to codes and payloads,
//!   plus a default JSON-backed implementation
//! - The field-wise merge policy used to collapse multi-frame replies

pub mod codec;
pub mod error;
pub mod frame;
pub mod merge;

pub use codec::{Codec, JsonCodec, ERROR_RESP};
pub use error::ProtocolError;
pub use frame::{Frame, FrameReassembler, LENGTH_PREFIX_LEN};
pub use merge::merge;

/// Default server port.
pub const DEFAULT_PORT: u16 = 8087;

/// Maximum accepted frame length (type code + payload, 16 MiB).
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;
