//! Index Module
//!
//! Secondary indexes: one append-only log per indexed field, mapping a field
//! value to the primary keys of the records holding it.
//!
//! ## Responsibilities
//! - Exact-match lookup of keys by field value (no range scans)
//! - Keep indexes consistent across updates by appending delete + put
//!   entries instead of rewriting history
//!
//! ## Layout
//! ```text
//! _idx/
//!   ├── name.idx     [len][bincode IndexEntry] frames
//!   └── email.idx
//! ```
//!
//! The value → keys lists are multisets. Putting the same key under the same
//! value twice stores it twice, and a delete removes only the first match,
//! so clearing it takes one delete per put.

mod entry;
mod log;

pub use entry::IndexEntry;
pub use log::IndexLog;

/// Extension of index log files
pub const INDEX_EXT: &str = "idx";
