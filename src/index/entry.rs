//! Index log entry definitions

use serde::{Deserialize, Serialize};

use crate::error::{ChunkDbError, Result};
use crate::schema::Value;

/// A single entry in an index log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Indexed field name
    pub field: String,

    /// Primary key of the record
    pub primary_key: Value,

    /// Field value the key is filed under
    pub value: Value,

    /// Delete marker: removes one occurrence of `primary_key` under `value`
    pub deleted: bool,
}

impl IndexEntry {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| ChunkDbError::Corruption(format!("undecodable index entry: {}", e)))
    }
}
