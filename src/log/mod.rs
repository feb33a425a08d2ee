//! Log module - frame extraction, snapshot decoding, and tailing.
//!
//! This module implements the read side of the bridge:
//! - Sentinel-delimited frame extraction from raw log text
//! - Frame buffer that carries partial frames across polls
//! - Schema-validated snapshot decoding
//! - Truncation-aware tailing, one-shot and on a background worker

mod extract;
mod frame_buffer;
mod snapshot;
mod tail;
mod watch;

pub use extract::{extract_frames, scan_frames, FrameScan, SENTINEL_BEGIN, SENTINEL_END};
pub use frame_buffer::{FrameBuffer, DEFAULT_MAX_PENDING_BYTES};
pub use snapshot::{decode_frame, Snapshot, SCHEMA_VERSION, VERSION_FIELD};
pub use tail::{LogTail, LogTailer, TailCursor};
pub use watch::{
    SnapshotStream, WatchConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_JOIN_TIMEOUT,
    DEFAULT_POLL_INTERVAL,
};
