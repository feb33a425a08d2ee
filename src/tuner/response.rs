//! Tuner response decoding.
//!
//! The tuner replies with a binary blob whose exact layout is not documented.
//! The Lua mod wraps its return value in result sentinels, so decoding keeps
//! only the printable ASCII bytes and cuts the result out from between them:
//!
//! ```text
//! \x00\x01..junk..CIV6BRIDGE_RESULT:PONG:CIV6BRIDGE_END..junk..  ->  "PONG"
//! ```
//!
//! A result starting with `ERR:` is the mod reporting a failed command.

use crate::error::{BridgeError, Result};

/// Opens the result region.
pub const RESULT_BEGIN: &str = "CIV6BRIDGE_RESULT:";

/// Closes the result region.
pub const RESULT_END: &str = ":CIV6BRIDGE_END";

/// Marks a result as a command failure.
pub const ERROR_PREFIX: &str = "ERR:";

/// Keep bytes in the printable ASCII range (space through `~`), in order.
///
/// Everything else is dropped, not replaced.
pub fn printable_text(data: &[u8]) -> String {
    data.iter()
        .filter(|b| (0x20..=0x7E).contains(*b))
        .map(|&b| char::from(b))
        .collect()
}

/// Extract the command result from a raw response buffer.
///
/// If either sentinel is missing (the end is searched after the begin), the
/// whole printable text is returned as a free-form response. The end-sentinel
/// may reuse the begin-sentinel's trailing colon, which yields an empty
/// result.
///
/// # Errors
///
/// Returns [`BridgeError::Command`] with the text after `ERR:` when the
/// extracted result reports a failure.
///
/// # Example
///
/// ```
/// use tuner_bridge::tuner::parse_response;
///
/// let data = b"\x00\x01junk CIV6BRIDGE_RESULT:OK:move_unit:CIV6BRIDGE_END";
/// assert_eq!(parse_response(data).unwrap(), "OK:move_unit");
/// ```
pub fn parse_response(data: &[u8]) -> Result<String> {
    let text = printable_text(data);

    let Some(begin_idx) = text.find(RESULT_BEGIN) else {
        return Ok(text);
    };
    let result_start = begin_idx + RESULT_BEGIN.len();
    // Step back one byte so a shared `:` still matches.
    let search_from = result_start - 1;
    let Some(end_offset) = text[search_from..].find(RESULT_END) else {
        return Ok(text);
    };

    let result = text.get(result_start..search_from + end_offset).unwrap_or("");
    if let Some(detail) = result.strip_prefix(ERROR_PREFIX) {
        return Err(BridgeError::Command(detail.to_string()));
    }

    Ok(result.to_string())
}
