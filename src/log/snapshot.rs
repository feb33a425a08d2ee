//! Frame decoding and the validated [`Snapshot`] payload.
//!
//! A frame is JSON text. It becomes a snapshot only if it is a JSON object
//! whose `version` field is a number equal to [`SCHEMA_VERSION`] (Lua
//! encoders may write it as `1.0`). Nothing else in the
//! payload is interpreted here; typed mapping is left to the caller through
//! [`Snapshot::deserialize`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// The only snapshot schema version this crate accepts.
pub const SCHEMA_VERSION: i64 = 1;

/// Name of the required version field.
pub const VERSION_FIELD: &str = "version";

/// A schema-validated state dump.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    fields: Map<String, Value>,
}

impl Snapshot {
    /// Schema version of this snapshot (always [`SCHEMA_VERSION`]).
    pub fn version(&self) -> i64 {
        SCHEMA_VERSION
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Borrow the whole payload.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Take ownership of the payload.
    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// Deserialize the payload into a caller-defined type.
    ///
    /// Mapping failures are reported as [`BridgeError::Parse`].
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| BridgeError::Parse(format!("Snapshot does not match target type: {}", e)))
    }
}

/// Parse a single frame and validate its schema version.
///
/// # Errors
///
/// - [`BridgeError::Parse`] if the text is not JSON or not a JSON object
/// - [`BridgeError::SchemaVersion`] if `version` is missing or not `1`
pub fn decode_frame(raw: &str) -> Result<Snapshot> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| BridgeError::Parse(format!("Invalid JSON in frame: {}", e)))?;

    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(BridgeError::Parse(format!(
                "Expected JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    let version = fields.get(VERSION_FIELD);
    if !version.is_some_and(is_schema_version) {
        return Err(BridgeError::SchemaVersion {
            expected: SCHEMA_VERSION,
            actual: version.cloned(),
        });
    }

    Ok(Snapshot { fields })
}

fn is_schema_version(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64() == Some(SCHEMA_VERSION as f64),
        _ => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
