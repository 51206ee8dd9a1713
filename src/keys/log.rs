//! Key Log
//!
//! Append-only primary key → location directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::chunk::Location;
use crate::compaction;
use crate::config::Config;
use crate::error::{ChunkDbError, Result};
use crate::log::{encode_plain, FrameKind, LogFile};
use crate::schema::{KeyKind, Value};

use super::{AutoIncrement, KeyEntry, AUTO_FILE, KEY_FILE};

/// Primary-key directory of one table
pub struct KeyLog {
    dir: PathBuf,

    /// Append handle of `pk.pk`
    file: LogFile,

    /// Live map: string form of key → record location
    live: HashMap<String, Location>,

    /// Counter, present for auto-increment tables
    auto: Option<AutoIncrement>,

    /// Chunk of the most recent put
    last_chunk: Option<u32>,
}

impl KeyLog {
    /// Open or create the key log in `dir`
    ///
    /// On open:
    /// 1. Create the directory and an empty log if missing
    /// 2. Replay every entry into the live map
    /// 3. Read the auto-increment counter, raising it to the largest integer
    ///    key the log has ever seen
    pub fn open(dir: &Path, auto_increment: bool, config: &Config) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut file = LogFile::open(&dir.join(KEY_FILE), config.sync_strategy)?;
        let mut live = HashMap::new();
        let mut last_chunk = None;
        let mut max_int_key: Option<i64> = None;

        let result = file.replay(FrameKind::Plain, |frame| {
            let entry = KeyEntry::deserialize(&frame.payload)?;
            if let Ok(n) = entry.value.parse::<i64>() {
                max_int_key = Some(max_int_key.map_or(n, |m| m.max(n)));
            }
            if entry.deleted {
                live.remove(&entry.value);
            } else {
                last_chunk = Some(entry.chunk_id);
                live.insert(entry.value.clone(), entry.location());
            }
            Ok(())
        })?;

        let auto = if auto_increment {
            let mut counter = AutoIncrement::open(&dir.join(AUTO_FILE))?;
            if let Some(max) = max_int_key {
                if max > counter.last() {
                    warn!(
                        counter = counter.last(),
                        max_key = max,
                        "auto-increment counter behind key log, raising it"
                    );
                    counter.advance_to(max)?;
                }
            }
            Some(counter)
        } else {
            None
        };

        debug!(
            dir = %dir.display(),
            entries = result.frames,
            live = live.len(),
            "opened key log"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            file,
            live,
            auto,
            last_chunk,
        })
    }

    /// Decide the primary key of a record about to be inserted
    ///
    /// Auto-increment tables hand out the next counter value, persisting the
    /// counter first. An explicit integer key above the counter is kept and
    /// the counter jumps to it. Other tables validate the caller's key:
    /// it must match `kind`, must not be an empty string, and must not be
    /// live already.
    pub fn assign(&mut self, key: &Value, kind: KeyKind) -> Result<Value> {
        if let Some(auto) = self.auto.as_mut() {
            if let Value::Int(explicit) = key {
                if *explicit > auto.last() {
                    auto.advance_to(*explicit)?;
                    return Ok(Value::Int(*explicit));
                }
            }
            return Ok(Value::Int(auto.next()?));
        }

        if key.kind() != kind {
            return Err(ChunkDbError::InvalidKey(format!(
                "expected {:?} key, got {:?}",
                kind,
                key.kind()
            )));
        }
        if key.is_empty() {
            return Err(ChunkDbError::InvalidKey("empty string key".to_string()));
        }

        let value = key.to_string();
        if self.live.contains_key(&value) {
            return Err(ChunkDbError::Conflict(value));
        }
        Ok(key.clone())
    }

    /// Point a key at a record location
    pub fn put(&mut self, key: &Value, location: Location) -> Result<()> {
        let entry = KeyEntry::put(key.to_string(), location);
        self.file.append(&encode_plain(&entry.serialize()?))?;

        self.live.insert(entry.value, location);
        self.last_chunk = Some(location.chunk_id);
        Ok(())
    }

    /// Current location of a key
    pub fn get(&self, key: &Value) -> Option<Location> {
        self.live.get(&key.to_string()).copied()
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.live.contains_key(&key.to_string())
    }

    /// Soft-delete a key
    ///
    /// Appends a delete marker and drops the key from the live map. The
    /// record's chunk slot is left for the caller to remove. Returns the
    /// location the key pointed at, or `None` (writing nothing) if it was
    /// not live.
    pub fn delete(&mut self, key: &Value) -> Result<Option<Location>> {
        let value = key.to_string();
        if !self.live.contains_key(&value) {
            return Ok(None);
        }

        let entry = KeyEntry::delete(value);
        self.file.append(&encode_plain(&entry.serialize()?))?;

        Ok(self.live.remove(&entry.value))
    }

    /// Force sync to disk
    pub fn flush(&self) -> Result<()> {
        self.file.sync()
    }

    /// Rewrite the live map to `pk.pk.opm` if the log holds dead entries
    pub fn optimize(&mut self) -> Result<Option<PathBuf>> {
        if self.file.frames() <= self.live.len() as u64 {
            return Ok(None);
        }

        let mut live: Vec<(&String, &Location)> = self.live.iter().collect();
        live.sort_by(|a, b| a.0.cmp(b.0));

        let mut frames = Vec::with_capacity(live.len());
        for (value, location) in live {
            let entry = KeyEntry::put(value.clone(), *location);
            frames.push(encode_plain(&entry.serialize()?));
        }

        let (path, _) = compaction::write_sibling(self.file.path(), frames)?;
        Ok(Some(path))
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Live keys with their locations
    pub fn live_locations(&self) -> impl Iterator<Item = (&str, Location)> + '_ {
        self.live.iter().map(|(k, loc)| (k.as_str(), *loc))
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Chunk of the most recent put, replayed or written
    pub fn last_chunk(&self) -> Option<u32> {
        self.last_chunk
    }

    /// Last auto-increment key handed out
    pub fn auto_increment(&self) -> Option<i64> {
        self.auto.as_ref().map(AutoIncrement::last)
    }

    /// Entries in the log file, including superseded and deleted ones
    pub fn entries_on_disk(&self) -> u64 {
        self.file.frames()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
