//! Bridge builder and facade.
//!
//! The [`BridgeBuilder`] collects the log path and tuner settings. The
//! [`Bridge`] pairs one [`LogTailer`] with one [`CommandChannel`]:
//! 1. Read the latest snapshot on demand
//! 2. Watch the log and stream or dispatch new snapshots
//! 3. Send commands to the game
//!
//! # Example
//!
//! ```ignore
//! use tuner_bridge::Bridge;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut bridge = Bridge::builder("Lua.log").port(4318).build()?;
//!
//!     if let Some(snapshot) = bridge.current_snapshot().await? {
//!         println!("turn {:?}", snapshot.get("turn"));
//!     }
//!
//!     bridge
//!         .on_snapshot(|snapshot| println!("turn {:?}", snapshot.get("turn")))
//!         .await;
//!
//!     bridge.commands().end_turn().await?;
//!     bridge.stop().await;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::commands::GameCommands;
use crate::error::Result;
use crate::log::{LogTailer, Snapshot, SnapshotStream, WatchConfig};
use crate::tuner::{ChannelConfig, CommandChannel};

/// Builder for configuring and creating a [`Bridge`].
pub struct BridgeBuilder {
    log_path: PathBuf,
    channel_config: ChannelConfig,
    watch_config: WatchConfig,
}

impl BridgeBuilder {
    /// Create a new builder for the given log file.
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            channel_config: ChannelConfig::default(),
            watch_config: WatchConfig::default(),
        }
    }

    /// Set the tuner host.
    ///
    /// Default: 127.0.0.1
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.channel_config.host = host.into();
        self
    }

    /// Set the tuner port.
    ///
    /// Default: 4318
    pub fn port(mut self, port: u16) -> Self {
        self.channel_config.port = port;
        self
    }

    /// Set the timeout for each connect, send and receive step.
    ///
    /// Default: 5 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.channel_config.timeout = timeout;
        self
    }

    /// Set the log poll interval.
    ///
    /// Default: 1 second
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.watch_config.poll_interval = interval;
        self
    }

    /// Set the number of snapshots queued for a slow consumer.
    ///
    /// Default: 64
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.watch_config.channel_capacity = capacity;
        self
    }

    /// Build the bridge.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::LogNotFound`](crate::BridgeError::LogNotFound)
    /// if the log file does not exist.
    pub fn build(self) -> Result<Bridge> {
        Ok(Bridge {
            tailer: LogTailer::new(self.log_path)?,
            channel: CommandChannel::with_config(self.channel_config),
            watch_config: self.watch_config,
            dispatcher: None,
        })
    }
}

/// Read access to the game log and a command channel to the game.
pub struct Bridge {
    tailer: LogTailer,
    channel: CommandChannel,
    watch_config: WatchConfig,
    /// Task forwarding snapshots to an `on_snapshot` callback.
    dispatcher: Option<JoinHandle<()>>,
}

impl Bridge {
    /// Create a new bridge builder.
    pub fn builder(log_path: impl Into<PathBuf>) -> BridgeBuilder {
        BridgeBuilder::new(log_path)
    }

    /// Read the log and return the latest valid snapshot, if any.
    pub async fn current_snapshot(&self) -> Result<Option<Snapshot>> {
        self.tailer.read_latest().await
    }

    /// Start watching the log and return the snapshot stream.
    ///
    /// Replaces any running watch or callback.
    pub async fn watch(&mut self) -> SnapshotStream {
        self.stop().await;
        self.tailer.watch(self.watch_config.clone()).await
    }

    /// Call `callback` for every new snapshot, on a background task.
    ///
    /// Only one callback is active at a time; calling again replaces the
    /// previous one.
    pub async fn on_snapshot<F>(&mut self, mut callback: F)
    where
        F: FnMut(Snapshot) + Send + 'static,
    {
        let mut stream = self.watch().await;
        self.dispatcher = Some(tokio::spawn(async move {
            while let Some(snapshot) = stream.next().await {
                callback(snapshot);
            }
        }));
    }

    /// Stop watching and wait for the background tasks to finish.
    pub async fn stop(&mut self) {
        self.tailer.stop().await;

        // The stream ends once the worker is gone, which ends the dispatcher.
        if let Some(mut dispatcher) = self.dispatcher.take() {
            let join_timeout = self.watch_config.join_timeout;
            if tokio::time::timeout(join_timeout, &mut dispatcher).await.is_err() {
                tracing::error!("Snapshot callback still running after {:?}, aborting", join_timeout);
                dispatcher.abort();
            }
        }
    }

    /// Check if a watch is running.
    pub fn is_watching(&self) -> bool {
        self.tailer.is_watching()
    }

    /// The command channel.
    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    /// Typed game commands over this bridge's channel.
    pub fn commands(&self) -> GameCommands<'_> {
        GameCommands::new(&self.channel)
    }

    /// Send a raw Lua command in the main context and return its result.
    pub async fn send_command(&self, command: &str) -> Result<String> {
        self.channel.send(command).await
    }

    /// Send a raw Lua command in the given context and return its result.
    pub async fn send_command_with_context(&self, command: &str, context: u32) -> Result<String> {
        self.channel.send_with_context(command, context).await
    }

    /// Check that the tuner is up and the Lua mod answers.
    pub async fn ping(&self) -> Result<bool> {
        self.commands().ping().await
    }

    /// Check that the tuner server accepts connections.
    pub async fn is_reachable(&self) -> bool {
        self.channel.is_reachable().await
    }
}
