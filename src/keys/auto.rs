//! Auto-increment counter
//!
//! The last assigned key, persisted to a small side file before the key is
//! handed out, so a restarted store never reissues a key.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ChunkDbError, Result};

/// Persisted auto-increment counter
#[derive(Debug)]
pub struct AutoIncrement {
    path: PathBuf,
    last: i64,
}

impl AutoIncrement {
    /// Read the counter, creating it at 0 if the file is missing
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            let counter = Self {
                path: path.to_path_buf(),
                last: 0,
            };
            counter.persist(0)?;
            return Ok(counter);
        }

        let bytes = fs::read(path)?;
        let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
            ChunkDbError::Corruption(format!(
                "{}: expected 8 bytes, found {}",
                path.display(),
                bytes.len()
            ))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            last: i64::from_le_bytes(raw),
        })
    }

    /// Last key handed out
    pub fn last(&self) -> i64 {
        self.last
    }

    /// Persist and return the next key
    pub fn next(&mut self) -> Result<i64> {
        let next = self
            .last
            .checked_add(1)
            .ok_or_else(|| ChunkDbError::InvalidKey("auto-increment overflow".to_string()))?;
        self.persist(next)?;
        self.last = next;
        Ok(next)
    }

    /// Raise the counter to `value` if it is higher
    pub fn advance_to(&mut self, value: i64) -> Result<()> {
        if value > self.last {
            self.persist(value)?;
            self.last = value;
        }
        Ok(())
    }

    /// Write to a temp file and rename it into place, so the counter file is
    /// never observed half-written
    fn persist(&self, value: i64) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(&value.to_le_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
