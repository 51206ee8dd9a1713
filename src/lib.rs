//! # chunkdb
//!
//! An embedded, file-backed document store for typed records:
//! - Records live in append-only chunk files, loaded lazily
//! - An append-only key log maps each primary key to its record
//! - Optional auto-increment keys and exact-match secondary indexes
//! - Two-step compaction (optimize, then apply) that never blocks writers
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Storage                              │
//! │           (type registry, one table per Record)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                          Table                               │
//! │        insert / get / set / delete / find / optimize         │
//! └───────┬─────────────────────┬─────────────────────┬─────────┘
//!         │                     │                     │
//!         ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │   KeyLog    │       │  ChunkLog   │       │  IndexLog   │
//!  │ _pk/pk.pk   │──────►│ _data/*.dat │◄──────│ _idx/*.idx  │
//!  │ _pk/auto.pk │  loc  │ (lazy load) │  key  │ (per field) │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!         │                     │                     │
//!         └─────────────────────┼─────────────────────┘
//!                               ▼
//!                     ┌───────────────────┐
//!                     │    log (frames)   │
//!                     │  append + replay  │
//!                     └───────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod codec;
pub mod schema;

pub mod log;
pub mod chunk;
pub mod keys;
pub mod index;
pub mod compaction;

pub mod table;
pub mod storage;
pub mod query;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ChunkDbError, Result};
pub use config::{Config, SyncStrategy};
pub use codec::{BincodeEncoder, Encoder, JsonEncoder};
pub use schema::{KeyKind, Record, Schema, Value};
pub use compaction::{ApplyReport, OptimizeReport};
pub use storage::Storage;
pub use query::Query;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of chunkdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
