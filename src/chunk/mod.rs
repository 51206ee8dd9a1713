//! Chunk Module
//!
//! Durable storage of encoded records, partitioned into size-bounded files.
//!
//! ## Responsibilities
//! - Append encoded records to the current chunk file under a random slot id
//! - Roll to a new, randomly numbered file when the current one fills up
//! - Load older files lazily, in full, on first access to any of their entries
//! - Remove entries from memory on delete/update (disk space is reclaimed by
//!   compaction)
//!
//! ## Layout
//! ```text
//! _data/
//!   ├── data417.dat     ┐
//!   ├── data52.dat      ├─ [len][slot][payload] frames, append-only
//!   └── data903.dat     ┘
//! ```
//!
//! A file is read front to back the first time one of its entries is needed.
//! This trades memory for never seeking through the variable-length,
//! unindexed format, and keeps untouched history off the heap.

mod log;
mod naming;

use serde::{Deserialize, Serialize};

pub use log::ChunkLog;
pub use naming::{chunk_path, list_chunk_ids, parse_chunk_id};

/// Where a record lives: chunk file id plus slot id within that file
///
/// This is the join key between the key log and the chunk log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub chunk_id: u32,
    pub slot_id: u64,
}

impl Location {
    pub fn new(chunk_id: u32, slot_id: u64) -> Self {
        Self { chunk_id, slot_id }
    }
}
