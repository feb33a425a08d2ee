//! Error types for tuner-bridge.

use std::fmt;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// Main error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The log file did not exist when the tailer was created.
    #[error("Log file not found: {}", .0.display())]
    LogNotFound(PathBuf),

    /// A frame was not valid JSON, or not a JSON object.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A frame carried a missing or unsupported schema version.
    #[error("Expected schema version {expected}, got {}", DisplayVersion(.actual))]
    SchemaVersion {
        /// The only version this crate accepts.
        expected: i64,
        /// The `version` field as found in the frame, if any.
        actual: Option<Value>,
    },

    /// The tuner socket refused the connection, timed out, or failed mid-transfer.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The game executed the command and reported an `ERR:` result.
    #[error("Command error: {0}")]
    Command(String),

    /// Malformed wire message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error while reading the log file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True for errors that only invalidate a single log frame.
    ///
    /// Pollers skip these and carry on; everything else is fatal to the
    /// operation that produced it.
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            BridgeError::Parse(_) | BridgeError::SchemaVersion { .. }
        )
    }
}

struct DisplayVersion<'a>(&'a Option<Value>);

impl fmt::Display for DisplayVersion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{}", value),
            None => f.write_str("none"),
        }
    }
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
