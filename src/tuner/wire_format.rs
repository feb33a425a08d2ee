//! Wire format encoding and decoding.
//!
//! Implements the 8-byte header format of the tuner command socket:
//! ```text
//! ┌──────────┬──────────┬──────────────────────────────┐
//! │ Length   │ Type     │ Payload                      │
//! │ 4 bytes  │ 4 bytes  │ CMD:<context>:<command>\0    │
//! │ uint32 LE│ uint32 LE│ `Length` bytes               │
//! └──────────┴──────────┴──────────────────────────────┘
//! ```
//!
//! All multi-byte integers are Little Endian. `Length` counts the payload
//! including its terminating zero byte.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{BridgeError, Result};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Message type tag for command messages.
pub const MESSAGE_TYPE: u32 = 3;

/// Literal prefix of every command payload.
pub const COMMAND_PREFIX: &str = "CMD:";

/// Separates the context id from the command text.
pub const CONTEXT_SEPARATOR: char = ':';

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Payload length in bytes, terminator included.
    pub payload_length: u32,
    /// Message type tag.
    pub message_type: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(payload_length: u32, message_type: u32) -> Self {
        Self {
            payload_length,
            message_type,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use tuner_bridge::tuner::{Header, MESSAGE_TYPE};
    ///
    /// let bytes = Header::new(12, MESSAGE_TYPE).encode();
    /// assert_eq!(bytes, [12, 0, 0, 0, 3, 0, 0, 0]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[4..8].copy_from_slice(&self.message_type.to_le_bytes());
        buf
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            payload_length: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            message_type: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}

/// An outbound command: Lua source plus the Lua context to run it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Lua state (context) id; `0` is the game's main context.
    pub context: u32,
    /// Raw command text.
    pub command: String,
}

impl Message {
    /// Create a new message.
    pub fn new(command: impl Into<String>, context: u32) -> Self {
        Self {
            context,
            command: command.into(),
        }
    }

    /// Build the payload: `CMD:<context>:<command>\0`.
    pub fn payload(&self) -> Vec<u8> {
        format!(
            "{}{}{}{}\0",
            COMMAND_PREFIX, self.context, CONTEXT_SEPARATOR, self.command
        )
        .into_bytes()
    }

    /// Encode the full message (header + payload).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Protocol`] if the payload does not fit the
    /// 32-bit length field.
    ///
    /// # Example
    ///
    /// ```
    /// use tuner_bridge::tuner::{Message, MESSAGE_TYPE};
    ///
    /// let bytes = Message::new("foo()", 0).encode().unwrap();
    /// assert_eq!(&bytes[..4], &12u32.to_le_bytes());
    /// assert_eq!(&bytes[4..8], &MESSAGE_TYPE.to_le_bytes());
    /// assert_eq!(&bytes[8..], b"CMD:0:foo()\0");
    /// ```
    pub fn encode(&self) -> Result<Bytes> {
        let payload = self.payload();
        let payload_length = u32::try_from(payload.len()).map_err(|_| {
            BridgeError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                payload.len(),
                u32::MAX
            ))
        })?;

        let header = Header::new(payload_length, MESSAGE_TYPE);
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_slice(&header.encode());
        buf.put_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode a full message (header + payload).
    ///
    /// Validates the length field, message type, prefix and terminator.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = Header::decode(buf)
            .ok_or_else(|| BridgeError::Protocol("Message shorter than header".to_string()))?;

        if header.message_type != MESSAGE_TYPE {
            return Err(BridgeError::Protocol(format!(
                "Unexpected message type {}",
                header.message_type
            )));
        }

        let payload = &buf[HEADER_SIZE..];
        if payload.len() != header.payload_length as usize {
            return Err(BridgeError::Protocol(format!(
                "Length field {} does not match payload size {}",
                header.payload_length,
                payload.len()
            )));
        }

        let body = payload
            .strip_suffix(b"\0")
            .ok_or_else(|| BridgeError::Protocol("Payload is not zero-terminated".to_string()))?;
        let body = std::str::from_utf8(body)
            .map_err(|e| BridgeError::Protocol(format!("Payload is not UTF-8: {}", e)))?;
        let rest = body
            .strip_prefix(COMMAND_PREFIX)
            .ok_or_else(|| BridgeError::Protocol("Missing command prefix".to_string()))?;
        let (context, command) = rest
            .split_once(CONTEXT_SEPARATOR)
            .ok_or_else(|| BridgeError::Protocol("Missing context separator".to_string()))?;
        let context = context
            .parse()
            .map_err(|_| BridgeError::Protocol(format!("Invalid context id {:?}", context)))?;

        Ok(Self::new(command, context))
    }
}

/// Encode a command message (standalone function).
#[inline]
pub fn build_message(command: &str, context: u32) -> Result<Bytes> {
    Message::new(command, context).encode()
}
