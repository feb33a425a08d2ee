//! Tuner module - command wire format, response decoding, and transport.
//!
//! This module implements the write side of the bridge:
//! - 8-byte little-endian header plus `CMD:<context>:<command>\0` payload
//! - Sentinel-based result extraction from the raw response
//! - One TCP connection per command, with timeouts on every step

mod channel;
mod response;
mod wire_format;

pub use channel::{
    ChannelConfig, CommandChannel, DEFAULT_HOST, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_PORT,
    DEFAULT_TIMEOUT,
};
pub use response::{parse_response, printable_text, ERROR_PREFIX, RESULT_BEGIN, RESULT_END};
pub use wire_format::{
    build_message, Header, Message, COMMAND_PREFIX, CONTEXT_SEPARATOR, HEADER_SIZE, MESSAGE_TYPE,
};
