//! Key Module
//!
//! The primary-key directory of a table.
//!
//! ## Responsibilities
//! - Map each live primary key to the chunk location of its record
//! - Persist that map as an append-only log with soft-delete markers
//! - Allocate auto-increment keys from a persisted counter
//!
//! ## Layout
//! ```text
//! _pk/
//!   ├── pk.pk      [len][bincode KeyEntry] frames
//!   └── auto.pk    8-byte little-endian counter (auto-increment tables only)
//! ```
//!
//! Replaying `pk.pk` in order with "last write wins, delete removes" yields
//! the live map. The whole map is built at open; lookups never touch disk.

mod auto;
mod entry;
mod log;

pub use auto::AutoIncrement;
pub use entry::KeyEntry;
pub use log::KeyLog;

/// Key log file name
pub const KEY_FILE: &str = "pk.pk";

/// Auto-increment counter file name
pub const AUTO_FILE: &str = "auto.pk";
