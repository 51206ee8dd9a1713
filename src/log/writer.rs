//! Log Writer
//!
//! Handles appending frames to a log file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::SyncStrategy;
use crate::error::Result;

use super::recovery::{replay, ReplayResult};
use super::{Frame, FrameKind};

/// An append-only log file handle
///
/// Tracks the committed length so a failed append can be cut back off the
/// file, keeping later frames aligned.
pub struct LogFile {
    path: PathBuf,
    file: File,
    sync_strategy: SyncStrategy,
    /// Bytes of complete frames in the file
    len: u64,
    /// Frames in the file, live or not
    frames: u64,
}

impl LogFile {
    /// Open or create a log file for appending
    ///
    /// The file is not read; call [`LogFile::replay`] to load it.
    pub fn open(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            sync_strategy,
            len,
            frames: 0,
        })
    }

    /// Replay every complete frame, cutting off a partial tail
    pub fn replay<F>(&mut self, kind: FrameKind, apply: F) -> Result<ReplayResult>
    where
        F: FnMut(Frame) -> Result<()>,
    {
        let result = replay(&self.file, &self.path, kind, apply)?;
        self.len = result.valid_len;
        self.frames = result.frames;
        Ok(result)
    }

    /// Append one encoded frame
    pub fn append(&mut self, frame: &[u8]) -> Result<()> {
        if let Err(e) = self.write_frame(frame) {
            // Drop whatever part of the frame reached the file
            if let Err(cut) = self.file.set_len(self.len) {
                warn!(path = %self.path.display(), error = %cut, "failed to cut back partial append");
            }
            return Err(e);
        }

        self.len += frame.len() as u64;
        self.frames += 1;
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.write_all(frame)?;
        if self.sync_strategy == SyncStrategy::EveryWrite {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written to this file, including superseded ones
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Bytes of complete frames
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
