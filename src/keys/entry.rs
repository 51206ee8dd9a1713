//! Key log entry definitions

use serde::{Deserialize, Serialize};

use crate::chunk::Location;
use crate::error::{ChunkDbError, Result};

/// A single entry in the key log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// String form of the primary key
    pub value: String,

    /// Chunk holding the record (unused for deletes)
    pub chunk_id: u32,

    /// Slot of the record within the chunk (unused for deletes)
    pub slot_id: u64,

    /// Delete marker: removes `value` from the live map
    pub deleted: bool,
}

impl KeyEntry {
    pub fn put(value: String, location: Location) -> Self {
        Self {
            value,
            chunk_id: location.chunk_id,
            slot_id: location.slot_id,
            deleted: false,
        }
    }

    pub fn delete(value: String) -> Self {
        Self {
            value,
            chunk_id: 0,
            slot_id: 0,
            deleted: true,
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.chunk_id, self.slot_id)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| ChunkDbError::Corruption(format!("undecodable key entry: {}", e)))
    }
}
