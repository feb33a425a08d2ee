//! Frame buffer for accumulating partial log reads.
//!
//! Uses `bytes::BytesMut` to hold bytes that have been read from the log but
//! not yet turned into frames. Each poll pushes the newly appended bytes; the
//! buffer hands back every frame that is now complete and keeps the rest:
//!
//! - an unterminated frame, from its begin-sentinel onward
//! - a begin-sentinel torn across two writes
//!
//! Payloads are decoded as lossy UTF-8 only once they are complete, so a
//! multi-byte character split between two polls survives intact.
//!
//! # Example
//!
//! ```
//! use tuner_bridge::log::{FrameBuffer, SENTINEL_BEGIN, SENTINEL_END};
//!
//! let mut buffer = FrameBuffer::new();
//! assert!(buffer.push(format!("{SENTINEL_BEGIN}{{\"ver").as_bytes()).is_empty());
//!
//! let frames = buffer.push(format!("sion\":1}}{SENTINEL_END}").as_bytes());
//! assert_eq!(frames, vec![r#"{"version":1}"#.to_string()]);
//! ```

use bytes::{Buf, BytesMut};

use super::extract::scan_frames;

/// Default cap on buffered bytes (16 MiB).
pub const DEFAULT_MAX_PENDING_BYTES: usize = 16 * 1024 * 1024;

/// Buffer for accumulating log bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Bytes read but not yet consumed by a complete frame.
    buffer: BytesMut,
    /// Maximum bytes kept between pushes.
    max_pending: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    pub fn new() -> Self {
        Self::with_max_pending(DEFAULT_MAX_PENDING_BYTES)
    }

    /// Create a new frame buffer with a custom cap on retained bytes.
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            max_pending,
        }
    }

    /// Push newly read bytes and extract all complete frames.
    ///
    /// Returns trimmed, non-empty payloads in the order they appear. If the
    /// retained tail grows past the cap (a begin-sentinel that is never
    /// closed), it is discarded so the buffer cannot grow without bound.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(data);

        let scan = scan_frames(&self.buffer);
        let frames = scan
            .frames
            .into_iter()
            .filter_map(|range| {
                let text = String::from_utf8_lossy(&self.buffer[range]);
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .collect();

        self.buffer.advance(scan.consumed);

        if self.buffer.len() > self.max_pending {
            tracing::warn!(
                "Discarding {} buffered bytes of an unterminated frame (limit {})",
                self.buffer.len(),
                self.max_pending
            );
            self.buffer.clear();
        }

        frames
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop any retained partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{SENTINEL_BEGIN, SENTINEL_END};

    fn frame_bytes(body: &str) -> Vec<u8> {
        format!("{SENTINEL_BEGIN}\n{body}\n{SENTINEL_END}\n").into_bytes()
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&frame_bytes("hello"));

        assert_eq!(frames, vec!["hello"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();
        let mut combined = b"noise\n".to_vec();
        combined.extend(frame_bytes("first"));
        combined.extend(frame_bytes("second"));
        combined.extend(frame_bytes("third"));

        let frames = buffer.push(&combined);

        assert_eq!(frames, vec!["first", "second", "third"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let bytes = frame_bytes(r#"{"version":1,"turn":7}"#);
        let split = SENTINEL_BEGIN.len() + 10;

        assert!(buffer.push(&bytes[..split]).is_empty());
        assert_eq!(buffer.len(), split);

        let frames = buffer.push(&bytes[split..]);
        assert_eq!(frames, vec![r#"{"version":1,"turn":7}"#]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_begin_sentinel() {
        let mut buffer = FrameBuffer::new();
        let bytes = frame_bytes("torn");

        assert!(buffer.push(&bytes[..5]).is_empty());
        assert_eq!(buffer.len(), 5);

        assert_eq!(buffer.push(&bytes[5..]), vec!["torn"]);
    }

    #[test]
    fn test_fragmented_end_sentinel() {
        let mut buffer = FrameBuffer::new();
        let bytes = frame_bytes("torn end");
        let split = bytes.len() - 6;

        assert!(buffer.push(&bytes[..split]).is_empty());
        assert_eq!(buffer.push(&bytes[split..]), vec!["torn end"]);
    }

    #[test]
    fn test_split_multibyte_character() {
        let mut buffer = FrameBuffer::new();
        let bytes = frame_bytes("Gilgameš");
        let split = bytes.iter().position(|&b| b >= 0x80).unwrap() + 1;

        assert!(buffer.push(&bytes[..split]).is_empty());
        assert_eq!(buffer.push(&bytes[split..]), vec!["Gilgameš"]);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let mut bytes = frame_bytes("one");
        bytes.extend(frame_bytes("two"));

        let mut all_frames = Vec::new();
        for byte in &bytes {
            all_frames.extend(buffer.push(&[*byte]));
        }

        assert_eq!(all_frames, vec!["one", "two"]);
    }

    #[test]
    fn test_noise_is_not_retained() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(b"plain log line without frames\n").is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_max_pending_discards_unterminated_frame() {
        let mut buffer = FrameBuffer::with_max_pending(64);
        let mut bytes = SENTINEL_BEGIN.as_bytes().to_vec();
        bytes.extend(std::iter::repeat(b'x').take(100));

        assert!(buffer.push(&bytes).is_empty());
        assert!(buffer.is_empty());

        // Buffer keeps working afterwards.
        assert_eq!(buffer.push(&frame_bytes("after")), vec!["after"]);
    }

    #[test]
    fn test_clear_drops_partial_frame() {
        let mut buffer = FrameBuffer::new();
        buffer.push(format!("{SENTINEL_BEGIN}\n{{\"version\":").as_bytes());
        assert!(!buffer.is_empty());

        buffer.clear();
        assert!(buffer.is_empty());

        // The stale half frame must not combine with new content.
        let frames = buffer.push(format!("1}}\n{SENTINEL_END}\n").as_bytes());
        assert!(frames.is_empty());
    }
}
