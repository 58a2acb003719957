//! Encode/decode boundary between caller types and opaque stored bytes.
//!
//! Values are stored as JSON documents. Strategies only ever see the encoded
//! bytes.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Object-safe view of a serializable value.
///
/// Lets strategies accept any `Serialize` value through a trait object while
/// deciding themselves how an encoding failure is reported.
pub trait Encodable {
    fn encode(&self) -> Result<Vec<u8>, serde_json::Error>;
}

impl<T: Serialize> Encodable for T {
    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Decodes stored bytes into the requested shape.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(bytes)
}
