//! Typed helpers for the commands the bridge Lua mod exposes.
//!
//! Each helper renders a Lua call against the mod's `Game.Agent*` functions
//! and sends it in the main context.

use crate::error::{BridgeError, Result};
use crate::tuner::CommandChannel;

/// Substring of a healthy `Game.AgentPing()` result.
pub const PING_REPLY: &str = "PONG";

/// Game commands sent over a borrowed [`CommandChannel`].
#[derive(Debug, Clone, Copy)]
pub struct GameCommands<'a> {
    channel: &'a CommandChannel,
}

impl<'a> GameCommands<'a> {
    /// Wrap a channel.
    pub fn new(channel: &'a CommandChannel) -> Self {
        Self { channel }
    }

    /// Move a unit to the target tile.
    pub async fn move_unit(&self, player_id: i32, unit_id: i32, x: i32, y: i32) -> Result<String> {
        self.channel
            .send(&format!("Game.AgentMoveUnit({player_id}, {unit_id}, {x}, {y})"))
            .await
    }

    /// End the current player's turn.
    pub async fn end_turn(&self) -> Result<String> {
        self.channel.send("Game.AgentEndTurn()").await
    }

    /// Set a player's gold balance to an exact amount.
    pub async fn set_gold(&self, player_id: i32, amount: i64) -> Result<String> {
        self.channel
            .send(&format!("Game.AgentSetGold({player_id}, {amount})"))
            .await
    }

    /// Add (or, with a negative amount, subtract) gold.
    pub async fn add_gold(&self, player_id: i32, amount: i64) -> Result<String> {
        self.channel
            .send(&format!("Game.AgentAddGold({player_id}, {amount})"))
            .await
    }

    /// Set the tech a player is researching, e.g. `TECH_MINING`.
    pub async fn research_tech(&self, player_id: i32, tech_type: &str) -> Result<String> {
        self.channel
            .send(&format!(
                "Game.AgentResearchTech({player_id}, {})",
                lua_string(tech_type)
            ))
            .await
    }

    /// Queue a unit, e.g. `UNIT_WARRIOR`, in a city's production.
    pub async fn produce_unit(&self, city_id: i32, player_id: i32, unit_type: &str) -> Result<String> {
        self.channel
            .send(&format!(
                "Game.AgentProduceUnit({city_id}, {player_id}, {})",
                lua_string(unit_type)
            ))
            .await
    }

    /// Check that the tuner is up and the mod answers.
    ///
    /// Connection failures yield `Ok(false)`; a command-level error from the
    /// mod is returned as is.
    pub async fn ping(&self) -> Result<bool> {
        match self.channel.send("Game.AgentPing()").await {
            Ok(result) => Ok(result.contains(PING_REPLY)),
            Err(BridgeError::Connection(e)) => {
                tracing::debug!("Ping failed: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Render `value` as a double-quoted Lua string literal.
fn lua_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
