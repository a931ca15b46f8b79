//! Storage and payload codecs shared by the modules.
//!
//! Partition values are bincode-encoded; request payloads and query data
//! are JSON.

use module_manager::ModuleError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Encode a stored value.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ModuleError> {
    bincode::serialize(value).map_err(|e| ModuleError::Codec(e.to_string()))
}

/// Decode a stored value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ModuleError> {
    bincode::deserialize(bytes).map_err(|e| ModuleError::Codec(e.to_string()))
}

/// Decode a request payload or query argument.
pub fn parse_payload<T: DeserializeOwned>(payload: &Value) -> Result<T, ModuleError> {
    T::deserialize(payload).map_err(|e| ModuleError::InvalidRequest(e.to_string()))
}

/// Encode a query result.
pub fn to_json<T: Serialize>(value: &T) -> Result<Value, ModuleError> {
    serde_json::to_value(value).map_err(ModuleError::from)
}

/// `prefix || id`.
pub fn prefixed(prefix: &[u8], id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + id.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(id);
    key
}

/// Fallback rendering for entries a decoder does not recognise.
pub fn hex_entry(key: &[u8], value: &[u8]) -> String {
    format!("{}={}", hex::encode(key), hex::encode(value))
}
