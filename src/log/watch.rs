//! Background watch worker.
//!
//! The poll loop runs on its own tokio task and hands snapshots to the
//! caller through a bounded channel, in the order they were decoded:
//!
//! ```text
//! LogTail::poll ─► mpsc::Sender<Snapshot> ─► SnapshotStream::next
//!       ▲
//!       └── watch::Receiver<bool> (stop signal)
//! ```
//!
//! Cancellation is cooperative. The stop signal is checked every iteration
//! and raced against both the inter-poll sleep and any pending send, so a
//! signalled worker exits without waiting out its interval. The owner joins
//! the task with a bounded timeout and aborts it if that expires.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::frame_buffer::DEFAULT_MAX_PENDING_BYTES;
use super::snapshot::Snapshot;
use super::tail::LogTail;

/// Default time between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of snapshots queued before the worker waits for the caller.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default time allowed for a stopped worker to finish.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a watch worker.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Sleep between poll iterations.
    pub poll_interval: Duration,
    /// Capacity of the snapshot channel.
    pub channel_capacity: usize,
    /// How long `stop` waits for the worker before aborting it.
    pub join_timeout: Duration,
    /// Cap on bytes held for an unterminated frame.
    pub max_pending_bytes: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            max_pending_bytes: DEFAULT_MAX_PENDING_BYTES,
        }
    }
}

impl WatchConfig {
    /// Default configuration with a custom poll interval.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..Self::default()
        }
    }
}

/// Ordered stream of snapshots produced by a watch worker.
///
/// Ends (returns `None`) once the worker has stopped and every queued
/// snapshot has been received.
#[derive(Debug)]
pub struct SnapshotStream {
    rx: mpsc::Receiver<Snapshot>,
}

impl SnapshotStream {
    /// Wait for the next snapshot.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Take the next snapshot if one is already queued.
    pub fn try_next(&mut self) -> Option<Snapshot> {
        self.rx.try_recv().ok()
    }
}

/// Handle to a running worker, owned by `LogTailer`.
pub(crate) struct WatchWorker {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    join_timeout: Duration,
}

impl WatchWorker {
    /// Spawn the poll loop over `tail`.
    pub(crate) fn spawn(tail: LogTail, config: &WatchConfig) -> (Self, SnapshotStream) {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);

        tracing::info!(
            "Watching {} every {:?} from offset {}",
            tail.path().display(),
            config.poll_interval,
            tail.cursor().offset()
        );

        let task = tokio::spawn(watch_loop(tail, config.poll_interval, tx, stop_rx));

        let worker = Self {
            stop_tx,
            task,
            join_timeout: config.join_timeout,
        };
        (worker, SnapshotStream { rx })
    }

    /// Ask the worker to stop without waiting for it.
    pub(crate) fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Check if the worker task has exited.
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the worker and wait up to the join timeout for it to exit.
    ///
    /// Returns `true` if the worker finished on its own.
    pub(crate) async fn stop(mut self) -> bool {
        self.signal_stop();

        match tokio::time::timeout(self.join_timeout, &mut self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!("Watch worker failed: {}", e);
                false
            }
            Err(_) => {
                tracing::error!(
                    "Watch worker did not stop within {:?}, aborting",
                    self.join_timeout
                );
                self.task.abort();
                false
            }
        }
    }
}

/// Main poll loop.
async fn watch_loop(
    mut tail: LogTail,
    poll_interval: Duration,
    tx: mpsc::Sender<Snapshot>,
    mut stop_rx: watch::Receiver<bool>,
) {
    'poll: loop {
        if *stop_rx.borrow() || tx.is_closed() {
            break;
        }

        match tail.poll().await {
            Ok(snapshots) => {
                for snapshot in snapshots {
                    tokio::select! {
                        biased;
                        _ = stop_rx.changed() => break 'poll,
                        sent = tx.send(snapshot) => {
                            if sent.is_err() {
                                tracing::debug!("Snapshot receiver dropped");
                                break 'poll;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                // Rotating loggers briefly remove the file; try again next tick.
                tracing::debug!("Log {} not accessible: {}", tail.path().display(), e);
            }
        }

        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    tracing::info!("Stopped watching {}", tail.path().display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{TailCursor, SENTINEL_BEGIN, SENTINEL_END};
    use serde_json::json;
    use std::io::Write;

    const FAST: Duration = Duration::from_millis(20);

    fn frame(body: &str) -> String {
        format!("{SENTINEL_BEGIN}\n{body}\n{SENTINEL_END}\n")
    }

    fn append(path: &std::path::Path, text: &str) {
        let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_watch_config_default() {
        let config = WatchConfig::default();
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.join_timeout, DEFAULT_JOIN_TIMEOUT);
        assert_eq!(config.max_pending_bytes, DEFAULT_MAX_PENDING_BYTES);

        let fast = WatchConfig::with_poll_interval(FAST);
        assert_eq!(fast.poll_interval, FAST);
        assert_eq!(fast.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[tokio::test]
    async fn test_worker_delivers_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lua.log");
        std::fs::write(&path, "").unwrap();

        let tail = LogTail::new(&path, TailCursor::default());
        let (worker, mut stream) = WatchWorker::spawn(tail, &WatchConfig::with_poll_interval(FAST));

        for turn in 1..=3 {
            append(&path, &frame(&format!(r#"{{"version":1,"turn":{turn}}}"#)));
        }

        for turn in 1..=3 {
            let snapshot = tokio::time::timeout(Duration::from_secs(2), stream.next())
                .await
                .expect("Timed out")
                .expect("Stream closed");
            assert_eq!(snapshot.get("turn"), Some(&json!(turn)));
        }

        assert!(worker.stop().await);
    }

    #[tokio::test]
    async fn test_stop_does_not_wait_for_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lua.log");
        std::fs::write(&path, "").unwrap();

        let tail = LogTail::new(&path, TailCursor::default());
        let config = WatchConfig::with_poll_interval(Duration::from_secs(3600));
        let (worker, mut stream) = WatchWorker::spawn(tail, &config);

        tokio::time::sleep(FAST).await;
        let started = std::time::Instant::now();
        assert!(worker.stop().await);
        assert!(started.elapsed() < Duration::from_secs(1));

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stop_interrupts_blocked_send() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lua.log");
        std::fs::write(&path, "").unwrap();

        let tail = LogTail::new(&path, TailCursor::default());
        let config = WatchConfig {
            channel_capacity: 1,
            ..WatchConfig::with_poll_interval(FAST)
        };
        let (worker, _stream) = WatchWorker::spawn(tail, &config);

        for turn in 1..=3 {
            append(&path, &frame(&format!(r#"{{"version":1,"turn":{turn}}}"#)));
        }

        // Nobody reads, so the worker parks on its second send.
        tokio::time::sleep(FAST * 5).await;
        assert!(!worker.is_finished());

        let started = std::time::Instant::now();
        assert!(worker.stop().await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_worker_exits_when_stream_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lua.log");
        std::fs::write(&path, "").unwrap();

        let tail = LogTail::new(&path, TailCursor::default());
        let (worker, stream) = WatchWorker::spawn(tail, &WatchConfig::with_poll_interval(FAST));
        drop(stream);

        tokio::time::timeout(Duration::from_secs(2), async {
            while !worker.is_finished() {
                tokio::time::sleep(FAST).await;
            }
        })
        .await
        .expect("Worker kept running without a receiver");
    }

    #[tokio::test]
    async fn test_worker_survives_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lua.log");
        std::fs::write(&path, "").unwrap();

        let tail = LogTail::new(&path, TailCursor::default());
        let (worker, mut stream) = WatchWorker::spawn(tail, &WatchConfig::with_poll_interval(FAST));

        std::fs::remove_file(&path).unwrap();
        tokio::time::sleep(FAST * 3).await;
        assert!(!worker.is_finished());

        std::fs::write(&path, frame(r#"{"version":1,"turn":9}"#)).unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("Timed out")
            .expect("Stream closed");
        assert_eq!(snapshot.get("turn"), Some(&json!(9)));

        worker.stop().await;
    }
}
