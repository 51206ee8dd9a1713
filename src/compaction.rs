//! Compaction
//!
//! Reclaims space held by deleted and superseded log entries without
//! stopping the live system, in two steps:
//!
//! 1. **Optimize**: each log writes its live entries to a sibling file
//!    (`<file>.opm`), fully, then flushes and closes it. The original file is
//!    not touched, so writers keep appending to it.
//! 2. **Apply**: later, with no writer holding the files open, every
//!    sibling that is newer than its original is renamed over it.
//!
//! Apply compares modification times only. If the original was appended to
//! after the rewrite, it is newer and the rewrite is left alone. This is a
//! heuristic, not a transaction: callers must not optimize or apply while
//! writes to the same table are in flight.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ChunkDbError, Result};

/// Extension of rewritten sibling files
pub const SIBLING_EXT: &str = "opm";

/// `dir/data12.dat` → `dir/data12.dat.opm`
pub fn sibling_path(original: &Path) -> PathBuf {
    let mut name = original
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(SIBLING_EXT);
    original.with_file_name(name)
}

/// Write encoded frames to the sibling of `original`
///
/// Any earlier rewrite is replaced. Returns the sibling path and the number
/// of frames written.
pub fn write_sibling<I>(original: &Path, frames: I) -> Result<(PathBuf, u64)>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    let path = sibling_path(original);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)?;

    let mut writer = BufWriter::new(file);
    let mut count = 0u64;
    for frame in frames {
        writer.write_all(&frame)?;
        count += 1;
    }
    writer.flush()?;

    let file = writer.into_inner().map_err(|e| {
        ChunkDbError::Storage(format!("Failed to flush rewrite {}: {}", path.display(), e))
    })?;
    file.sync_all()?;

    debug!(original = %original.display(), frames = count, "wrote compacted sibling");
    Ok((path, count))
}

/// Outcome of an optimize pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OptimizeReport {
    /// Sibling files written
    pub rewritten: Vec<PathBuf>,
}

impl OptimizeReport {
    /// Fold another report into this one
    pub fn merge(&mut self, other: OptimizeReport) {
        self.rewritten.extend(other.rewritten);
    }
}

/// Outcome of an apply pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Originals replaced by their rewrite
    pub adopted: Vec<PathBuf>,

    /// Rewrites left in place because the original is as new or newer
    pub stale: Vec<PathBuf>,

    /// Rewrites whose original no longer exists
    pub orphaned: Vec<PathBuf>,
}

impl ApplyReport {
    /// Fold another report into this one
    pub fn merge(&mut self, other: ApplyReport) {
        self.adopted.extend(other.adopted);
        self.stale.extend(other.stale);
        self.orphaned.extend(other.orphaned);
    }
}

/// Adopt every newer `*.opm` sibling found in `dir`
///
/// Must run while no log holds the originals open.
pub fn apply_dir(dir: &Path) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();
    if !dir.is_dir() {
        return Ok(report);
    }

    let mut siblings = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == SIBLING_EXT) {
            siblings.push(path);
        }
    }
    siblings.sort();

    for sibling in siblings {
        let original = sibling.with_extension("");

        let original_meta = match fs::metadata(&original) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(sibling = %sibling.display(), "no original for rewrite, skipping");
                report.orphaned.push(sibling);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let sibling_modified = fs::metadata(&sibling)?.modified()?;

        if sibling_modified > original_meta.modified()? {
            fs::rename(&sibling, &original)?;
            debug!(original = %original.display(), "adopted compacted file");
            report.adopted.push(original);
        } else {
            debug!(sibling = %sibling.display(), "original is newer than rewrite, keeping it");
            report.stale.push(sibling);
        }
    }

    Ok(report)
}
