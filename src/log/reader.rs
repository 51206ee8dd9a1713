//! Frame Reader
//!
//! Sequential iteration over the frames of a log file.

use std::io::Read;

use crate::error::Result;

use super::{Frame, FrameKind, LEN_SIZE};

/// Iterator over complete frames, front to back
///
/// Stops at end-of-file. A frame whose header or payload runs past the end
/// of the file is a partial write: iteration ends there and
/// [`FrameReader::was_truncated`] reports it.
pub struct FrameReader<R> {
    reader: R,
    kind: FrameKind,
    /// Bytes not yet consumed
    remaining: u64,
    /// End offset of the last complete frame
    valid_len: u64,
    truncated: bool,
    done: bool,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a reader positioned at the start of a file of `file_len` bytes
    pub fn new(reader: R, kind: FrameKind, file_len: u64) -> Self {
        Self {
            reader,
            kind,
            remaining: file_len,
            valid_len: 0,
            truncated: false,
            done: false,
        }
    }

    /// Offset just past the last complete frame read so far
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }

    /// Whether iteration stopped on a partial frame
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    fn stop_truncated(&mut self) -> Option<Result<Frame>> {
        self.truncated = true;
        self.done = true;
        None
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == 0 {
            self.done = true;
            return None;
        }

        let header_size = self.kind.header_size();
        if self.remaining < header_size {
            return self.stop_truncated();
        }

        // Read header
        let mut header = [0u8; 16];
        let header = &mut header[..header_size as usize];
        if let Err(e) = self.reader.read_exact(header) {
            self.done = true;
            return Some(Err(e.into()));
        }

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&header[0..LEN_SIZE as usize]);
        let len = u64::from_le_bytes(len_bytes);

        let slot = match self.kind {
            FrameKind::Plain => None,
            FrameKind::Slotted => {
                let mut slot_bytes = [0u8; 8];
                slot_bytes.copy_from_slice(&header[8..16]);
                Some(u64::from_le_bytes(slot_bytes))
            }
        };

        // Payload must fit in what is left of the file
        if len > self.remaining - header_size {
            return self.stop_truncated();
        }

        let mut payload = vec![0u8; len as usize];
        if let Err(e) = self.reader.read_exact(&mut payload) {
            self.done = true;
            return Some(Err(e.into()));
        }

        let frame_size = header_size + len;
        self.remaining -= frame_size;
        self.valid_len += frame_size;

        Some(Ok(Frame { slot, payload }))
    }
}
