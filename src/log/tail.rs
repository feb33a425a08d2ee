//! Incremental, truncation-aware log tailing.
//!
//! [`LogTail`] is one pull-based poller: each [`LogTail::poll`] reads the
//! bytes appended since the last call and returns the snapshots they complete.
//! [`LogTailer`] owns the log path and runs a `LogTail` on a background worker
//! (see [`LogTailer::watch`]), or answers one-shot queries with
//! [`LogTailer::read_latest`].
//!
//! # Example
//!
//! ```ignore
//! use tuner_bridge::log::{LogTailer, WatchConfig};
//!
//! let mut tailer = LogTailer::new("Lua.log")?;
//!
//! if let Some(snapshot) = tailer.read_latest().await? {
//!     println!("turn {:?}", snapshot.get("turn"));
//! }
//!
//! let mut stream = tailer.watch(WatchConfig::default()).await;
//! while let Some(snapshot) = stream.next().await {
//!     println!("turn {:?}", snapshot.get("turn"));
//! }
//! ```

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::extract::extract_frames;
use super::frame_buffer::{FrameBuffer, DEFAULT_MAX_PENDING_BYTES};
use super::snapshot::{decode_frame, Snapshot};
use super::watch::{SnapshotStream, WatchConfig, WatchWorker};
use crate::error::{BridgeError, Result};

/// Read position in the log file.
///
/// Only moves forward, except when the file shrinks below it: that means the
/// log was truncated or replaced, and the cursor goes back to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailCursor {
    offset: u64,
}

impl TailCursor {
    /// Create a cursor at the given byte offset.
    pub fn new(offset: u64) -> Self {
        Self { offset }
    }

    /// Current byte offset.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reset to zero if the file is now shorter than the cursor.
    ///
    /// Returns `true` if a reset happened.
    pub fn reset_if_truncated(&mut self, size: u64) -> bool {
        if size < self.offset {
            self.offset = 0;
            true
        } else {
            false
        }
    }

    /// Move forward by `len` bytes.
    pub fn advance(&mut self, len: u64) {
        self.offset += len;
    }
}

/// A single tail over one log file.
pub struct LogTail {
    path: PathBuf,
    cursor: TailCursor,
    buffer: FrameBuffer,
}

impl LogTail {
    /// Create a tail starting at `cursor`.
    pub fn new(path: impl Into<PathBuf>, cursor: TailCursor) -> Self {
        Self::with_max_pending(path, cursor, DEFAULT_MAX_PENDING_BYTES)
    }

    /// Create a tail with a custom cap on the buffered partial frame.
    pub fn with_max_pending(path: impl Into<PathBuf>, cursor: TailCursor, max_pending: usize) -> Self {
        Self {
            path: path.into(),
            cursor,
            buffer: FrameBuffer::with_max_pending(max_pending),
        }
    }

    /// Create a tail positioned at the current end of the file.
    ///
    /// Only content appended afterwards is observed. If the file cannot be
    /// read right now, the tail starts at zero so that a file created later is
    /// read from its beginning.
    pub async fn at_end(path: impl Into<PathBuf>, max_pending: usize) -> Self {
        let path = path.into();
        let offset = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::debug!("Cannot stat {}, tailing from start: {}", path.display(), e);
                0
            }
        };
        Self::with_max_pending(path, TailCursor::new(offset), max_pending)
    }

    /// Path being tailed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current cursor.
    pub fn cursor(&self) -> TailCursor {
        self.cursor
    }

    /// Run one poll iteration.
    ///
    /// Returns the snapshots completed by newly appended bytes, in log order.
    /// Frames that fail to parse or carry the wrong schema version are logged
    /// and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] if the file is not accessible; the cursor
    /// is left untouched so the next poll can retry.
    pub async fn poll(&mut self) -> Result<Vec<Snapshot>> {
        let size = tokio::fs::metadata(&self.path).await?.len();

        if self.cursor.reset_if_truncated(size) {
            tracing::info!(
                "Log {} shrank to {} bytes, reading new session from start",
                self.path.display(),
                size
            );
            self.buffer.clear();
        }

        if size <= self.cursor.offset() {
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(self.cursor.offset())).await?;

        let mut appended = Vec::with_capacity((size - self.cursor.offset()) as usize);
        file.read_to_end(&mut appended).await?;
        self.cursor.advance(appended.len() as u64);

        tracing::debug!(
            "Read {} bytes from {}, cursor now {}",
            appended.len(),
            self.path.display(),
            self.cursor.offset()
        );

        let frames = self.buffer.push(&appended);
        Ok(decode_all(frames.iter().map(String::as_str)))
    }
}

/// Decode frames in order, dropping the ones that fail.
fn decode_all<'a>(frames: impl Iterator<Item = &'a str>) -> Vec<Snapshot> {
    frames
        .filter_map(|raw| match decode_frame(raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Skipping log frame: {}", e);
                None
            }
        })
        .collect()
}

/// Owner of a log path: one-shot reads and at most one watch worker.
pub struct LogTailer {
    path: PathBuf,
    worker: Option<WatchWorker>,
}

impl LogTailer {
    /// Create a tailer for an existing log file.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::LogNotFound`] if `path` does not exist.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(BridgeError::LogNotFound(path));
        }
        Ok(Self { path, worker: None })
    }

    /// Path being tailed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file and return the most recent frame that decodes.
    ///
    /// Frames are tried from last to first; undecodable ones are skipped, so
    /// a newer malformed or wrong-version frame does not hide an older valid
    /// one. Returns `None` if no frame decodes.
    pub async fn read_latest(&self) -> Result<Option<Snapshot>> {
        let bytes = tokio::fs::read(&self.path).await?;
        let text = String::from_utf8_lossy(&bytes);

        let latest = extract_frames(&text)
            .into_iter()
            .rev()
            .find_map(|raw| match decode_frame(raw) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    tracing::debug!("Skipping log frame while scanning back: {}", e);
                    None
                }
            });

        Ok(latest)
    }

    /// Start watching the log for new snapshots.
    ///
    /// Any previous worker is stopped and joined first, so at most one worker
    /// reads this log per tailer. Only content appended after this call
    /// returns is observed.
    pub async fn watch(&mut self, config: WatchConfig) -> SnapshotStream {
        self.stop().await;

        let tail = LogTail::at_end(&self.path, config.max_pending_bytes).await;
        let (worker, stream) = WatchWorker::spawn(tail, &config);
        self.worker = Some(worker);
        stream
    }

    /// Stop the watch worker, if any, and wait for it to finish.
    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop().await;
        }
    }

    /// Check if a watch worker is running.
    pub fn is_watching(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl Drop for LogTailer {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.as_ref() {
            worker.signal_stop();
        }
    }
}
