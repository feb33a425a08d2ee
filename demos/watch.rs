//! Watch Demo - print every new game snapshot.
//!
//! This example demonstrates:
//! - Building a bridge over an existing game log
//! - Reading the latest snapshot already in the log
//! - Streaming new snapshots until Ctrl-C
//!
//! # Running
//!
//! ```text
//! RUST_LOG=tuner_bridge=debug cargo run --example watch -- /path/to/Lua.log
//! ```

use tracing_subscriber::EnvFilter;
use tuner_bridge::{Bridge, Snapshot};

fn describe(snapshot: &Snapshot) -> String {
    let turn = snapshot
        .get("turn")
        .map(|t| t.to_string())
        .unwrap_or_else(|| "?".to_string());
    format!("turn {} ({} fields)", turn, snapshot.as_map().len())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let log_path = std::env::args()
        .nth(1)
        .ok_or("usage: watch <path to Lua.log>")?;

    let mut bridge = Bridge::builder(log_path).build()?;

    match bridge.current_snapshot().await? {
        Some(snapshot) => println!("latest: {}", describe(&snapshot)),
        None => println!("no snapshot in log yet"),
    }

    let mut snapshots = bridge.watch().await;
    loop {
        tokio::select! {
            snapshot = snapshots.next() => match snapshot {
                Some(snapshot) => println!("new: {}", describe(&snapshot)),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    bridge.stop().await;
    Ok(())
}
