//! Record codec
//!
//! The engine stores records as opaque bytes; an [`Encoder`] turns a record
//! into those bytes and back. Each `Storage` owns its encoder, chosen at
//! construction.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Serializes records to and from bytes
///
/// Implementations must round-trip: `decode(encode(r)) == r`.
pub trait Encoder: Send + Sync {
    /// Encode a record to bytes
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode a record from bytes
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// Compact binary encoding via bincode (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeEncoder;

impl Encoder for BincodeEncoder {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// JSON encoding via serde_json; larger, but readable with a hex dump
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
