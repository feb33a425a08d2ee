//! # tuner-bridge
//!
//! Rust client for a Civilization VI agent bridge.
//!
//! A Lua mod inside the game writes state snapshots to its log file and
//! executes commands received through the FireTuner debug socket. This crate
//! covers both directions.
//!
//! ## Architecture
//!
//! - **Read side** (log file): sentinel-delimited JSON snapshots, tailed by
//!   polling with truncation detection
//! - **Write side** (tuner TCP socket): length-prefixed binary command
//!   messages, one connection per command
//!
//! ## Example
//!
//! ```ignore
//! use tuner_bridge::Bridge;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut bridge = Bridge::builder("Lua.log").build().unwrap();
//!
//!     let mut snapshots = bridge.watch().await;
//!     while let Some(snapshot) = snapshots.next().await {
//!         println!("turn {:?}", snapshot.get("turn"));
//!         bridge.commands().end_turn().await.unwrap();
//!     }
//! }
//! ```

pub mod commands;
pub mod error;
pub mod log;
pub mod tuner;

mod bridge;

pub use bridge::{Bridge, BridgeBuilder};
pub use commands::GameCommands;
pub use error::{BridgeError, Result};
pub use log::{LogTailer, Snapshot, SnapshotStream, WatchConfig};
pub use tuner::{ChannelConfig, CommandChannel};
