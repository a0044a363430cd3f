//! Thin wrapper over `serde_json` so the rest of the crate doesn't reach
//! past this module for (de)serialization.

use serde::de::DeserializeOwned;

pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<T> {
    serde_json::from_slice(bytes)
}
