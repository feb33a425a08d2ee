//! Sentinel-delimited frame extraction.
//!
//! The game-side Lua mod writes each state dump as:
//!
//! ```text
//! [CIV6BRIDGE_BEGIN_v1]
//! {"version":1,"turn":42,...}
//! [CIV6BRIDGE_END_v1]
//! ```
//!
//! interleaved with unrelated log output. Extraction is stateless: it reports
//! every complete pair in the input and where the unconsumed tail starts, and
//! leaves it to the caller to keep that tail for the next read.
//!
//! # Example
//!
//! ```
//! use tuner_bridge::log::{extract_frames, SENTINEL_BEGIN, SENTINEL_END};
//!
//! let text = format!("noise\n{SENTINEL_BEGIN}\n{{\"version\":1}}\n{SENTINEL_END}\n");
//! assert_eq!(extract_frames(&text), vec![r#"{"version":1}"#]);
//! ```

use std::ops::Range;

/// Marks the start of a frame. The `v1` suffix versions the framing itself.
pub const SENTINEL_BEGIN: &str = "[CIV6BRIDGE_BEGIN_v1]";

/// Marks the end of a frame.
pub const SENTINEL_END: &str = "[CIV6BRIDGE_END_v1]";

/// Result of scanning a byte buffer for frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameScan {
    /// Byte ranges of the raw (untrimmed) payloads, left to right.
    pub frames: Vec<Range<usize>>,
    /// Number of leading bytes fully processed.
    ///
    /// Everything from here on is either an unterminated frame or the start of
    /// a begin-sentinel torn across two writes, and must be scanned again once
    /// more bytes arrive.
    pub consumed: usize,
}

/// Scan `buf` for complete begin/end pairs.
///
/// Each frame runs from the first begin-sentinel at or after the scan
/// position to the first end-sentinel after it. A second begin-sentinel
/// before that end is payload, not a new frame. Text between pairs is
/// ignored.
pub fn scan_frames(buf: &[u8]) -> FrameScan {
    let begin = SENTINEL_BEGIN.as_bytes();
    let end = SENTINEL_END.as_bytes();

    let mut frames = Vec::new();
    let mut cursor = 0;

    loop {
        let Some(begin_idx) = find(buf, begin, cursor) else {
            let keep = torn_prefix_len(&buf[cursor..], begin);
            return FrameScan {
                frames,
                consumed: buf.len() - keep,
            };
        };

        let payload_start = begin_idx + begin.len();
        let Some(end_idx) = find(buf, end, payload_start) else {
            // Frame still being written; keep it from its begin-sentinel.
            return FrameScan {
                frames,
                consumed: begin_idx,
            };
        };

        frames.push(payload_start..end_idx);
        cursor = end_idx + end.len();
    }
}

/// Return every complete, non-empty frame in `text`, trimmed, left to right.
///
/// A trailing begin-sentinel without a matching end yields nothing.
pub fn extract_frames(text: &str) -> Vec<&str> {
    // Sentinels are ASCII, so every range boundary is a char boundary.
    scan_frames(text.as_bytes())
        .frames
        .into_iter()
        .map(|range| text[range].trim())
        .filter(|frame| !frame.is_empty())
        .collect()
}

/// Position of `needle` in `haystack` at or after `from`.
pub(crate) fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|idx| idx + from)
}

/// Length of the longest suffix of `tail` that is a proper prefix of `needle`.
fn torn_prefix_len(tail: &[u8], needle: &[u8]) -> usize {
    let max = tail.len().min(needle.len().saturating_sub(1));
    (1..=max)
        .rev()
        .find(|&k| tail.ends_with(&needle[..k]))
        .unwrap_or(0)
}
