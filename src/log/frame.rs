//! Frame definitions
//!
//! Defines the byte layout of a single log frame.

/// Size of the length prefix
pub const LEN_SIZE: u64 = 8;

/// Size of the slot id carried by chunk frames
pub const SLOT_SIZE: u64 = 8;

/// Which header a log's frames carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// `[len][payload]`: key and index logs
    Plain,

    /// `[len][slot][payload]`: chunk files
    Slotted,
}

impl FrameKind {
    /// Bytes before the payload
    pub fn header_size(self) -> u64 {
        match self {
            FrameKind::Plain => LEN_SIZE,
            FrameKind::Slotted => LEN_SIZE + SLOT_SIZE,
        }
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Slot id, present only for [`FrameKind::Slotted`]
    pub slot: Option<u64>,

    /// Raw payload bytes
    pub payload: Vec<u8>,
}

/// Encode a plain frame: `[len][payload]`
pub fn encode_plain(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LEN_SIZE as usize + payload.len());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Encode a slotted frame: `[len][slot][payload]`
pub fn encode_slotted(slot: u64, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity((LEN_SIZE + SLOT_SIZE) as usize + payload.len());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(&slot.to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}
