//! Send Demo - run one Lua command through the tuner socket.
//!
//! With no argument the demo pings the bridge mod; otherwise the first
//! argument is sent as a raw Lua command and the result is printed.
//!
//! # Running
//!
//! ```text
//! cargo run --example send
//! cargo run --example send -- "return Game.GetCurrentGameTurn()"
//! TUNER_PORT=4319 cargo run --example send -- "Game.AgentEndTurn()"
//! ```

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use tuner_bridge::{BridgeError, CommandChannel, GameCommands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut channel = CommandChannel::new().timeout(Duration::from_secs(3));
    if let Ok(port) = std::env::var("TUNER_PORT") {
        channel = channel.port(port.parse()?);
    }

    let Some(command) = std::env::args().nth(1) else {
        let alive = GameCommands::new(&channel).ping().await?;
        println!("{}: {}", channel.addr(), if alive { "PONG" } else { "no answer" });
        return Ok(());
    };

    match channel.send(&command).await {
        Ok(result) => println!("{}", result),
        Err(BridgeError::Command(detail)) => eprintln!("command failed: {}", detail),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
