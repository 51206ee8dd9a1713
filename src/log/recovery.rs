//! Log Recovery
//!
//! Replays a log file from the start after open.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use tracing::warn;

use crate::error::Result;

use super::{Frame, FrameKind, FrameReader};

/// Result of a replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayResult {
    /// Number of complete frames applied
    pub frames: u64,

    /// Offset just past the last complete frame
    pub valid_len: u64,

    /// Whether a partial trailing frame was cut off
    pub was_truncated: bool,
}

/// Replay every complete frame of `file` in order
///
/// This will:
/// 1. Read frames front to back, handing each to `apply`
/// 2. Stop cleanly at end-of-file
/// 3. Treat a partial final frame as end-of-file and truncate it away, so
///    the next append starts on a frame boundary
pub fn replay<F>(file: &File, path: &Path, kind: FrameKind, mut apply: F) -> Result<ReplayResult>
where
    F: FnMut(Frame) -> Result<()>,
{
    let file_len = file.metadata()?.len();
    let mut handle = file;
    handle.seek(SeekFrom::Start(0))?;

    let mut reader = FrameReader::new(BufReader::new(handle), kind, file_len);
    let mut frames = 0u64;
    for frame in reader.by_ref() {
        apply(frame?)?;
        frames += 1;
    }

    let valid_len = reader.valid_len();
    let was_truncated = reader.was_truncated();

    if was_truncated {
        warn!(
            path = %path.display(),
            kept = valid_len,
            dropped = file_len - valid_len,
            "cutting off partial frame at end of log"
        );
        file.set_len(valid_len)?;
    }

    Ok(ReplayResult {
        frames,
        valid_len,
        was_truncated,
    })
}
