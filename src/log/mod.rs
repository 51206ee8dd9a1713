//! Log Framing Module
//!
//! Shared on-disk framing for every append-only log in the store.
//!
//! ## Responsibilities
//! - Length-prefixed framing of opaque payloads
//! - Appending whole frames to a log file (optionally fsynced)
//! - Sequential replay on open
//! - Cutting off a partial trailing frame left by a crash
//!
//! ## File Format
//! ```text
//! Chunk files (slotted frames)
//! ┌──────────────┬──────────────┬──────────────────────┐
//! │ Len (8, LE)  │ Slot (8, LE) │ Payload (Len bytes)  │
//! └──────────────┴──────────────┴──────────────────────┘
//!
//! Key and index logs (plain frames)
//! ┌──────────────┬──────────────────────────────────────┐
//! │ Len (8, LE)  │ Payload (Len bytes, bincode entry)   │
//! └──────────────┴──────────────────────────────────────┘
//! ```
//!
//! Frames repeat until end-of-file. There is no footer and no index, so a
//! file can only be read front to back.

mod frame;
mod reader;
mod recovery;
mod writer;

pub use frame::{encode_plain, encode_slotted, Frame, FrameKind, LEN_SIZE, SLOT_SIZE};
pub use reader::FrameReader;
pub use recovery::{replay, ReplayResult};
pub use writer::LogFile;
