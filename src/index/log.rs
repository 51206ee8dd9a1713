//! Index Log
//!
//! Append-only value → keys directory for a single field.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::compaction;
use crate::config::Config;
use crate::error::Result;
use crate::log::{encode_plain, FrameKind, LogFile};
use crate::schema::Value;

use super::{IndexEntry, INDEX_EXT};

/// Keys filed under one field value
#[derive(Debug, Clone)]
struct Bucket {
    value: Value,
    keys: Vec<Value>,
}

/// Secondary index of one field
pub struct IndexLog {
    field: String,

    /// Append handle of `{field}.idx`
    file: LogFile,

    /// String form of value → bucket
    buckets: HashMap<String, Bucket>,
}

impl IndexLog {
    /// Open or create the index log for `field` in `dir`
    pub fn open(dir: &Path, field: &str, config: &Config) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let path = dir.join(format!("{}.{}", field.to_lowercase(), INDEX_EXT));
        let mut file = LogFile::open(&path, config.sync_strategy)?;
        let mut buckets = HashMap::new();
        let mut foreign = 0u64;

        let result = file.replay(FrameKind::Plain, |frame| {
            let entry = IndexEntry::deserialize(&frame.payload)?;
            if entry.field != field {
                foreign += 1;
                return Ok(());
            }
            if entry.deleted {
                remove_first(&mut buckets, &entry.primary_key, &entry.value);
            } else {
                insert(&mut buckets, entry.primary_key, entry.value);
            }
            Ok(())
        })?;

        debug!(
            field,
            entries = result.frames,
            values = buckets.len(),
            foreign,
            "opened index log"
        );

        Ok(Self {
            field: field.to_string(),
            file,
            buckets,
        })
    }

    /// File `key` under `value`
    pub fn put(&mut self, key: &Value, value: &Value) -> Result<()> {
        self.append(key, value, false)?;
        insert(&mut self.buckets, key.clone(), value.clone());
        Ok(())
    }

    /// Move `key` from `old` to `new`
    ///
    /// No-op when the values are equal; otherwise a delete entry for `old`
    /// and a put entry for `new` are appended.
    pub fn set(&mut self, key: &Value, old: &Value, new: &Value) -> Result<()> {
        if old.to_string() == new.to_string() {
            return Ok(());
        }
        self.delete(key, old)?;
        self.put(key, new)
    }

    /// Remove the first occurrence of `key` under `value`
    pub fn delete(&mut self, key: &Value, value: &Value) -> Result<()> {
        self.append(key, value, true)?;
        remove_first(&mut self.buckets, key, value);
        Ok(())
    }

    /// Keys filed under `value`, in insertion order
    pub fn get(&self, value: &Value) -> Vec<Value> {
        self.buckets
            .get(&value.to_string())
            .map(|bucket| bucket.keys.clone())
            .unwrap_or_default()
    }

    /// Force sync to disk
    pub fn flush(&self) -> Result<()> {
        self.file.sync()
    }

    /// Rewrite the live entries to `{field}.idx.opm` if the log holds dead
    /// entries
    ///
    /// Duplicates are written once per occurrence, so the rewrite replays to
    /// the same multiset.
    pub fn optimize(&mut self) -> Result<Option<PathBuf>> {
        let live = self.live_entries() as u64;
        if self.file.frames() <= live {
            return Ok(None);
        }

        let mut values: Vec<&String> = self.buckets.keys().collect();
        values.sort();

        let mut frames = Vec::with_capacity(live as usize);
        for value in values {
            let bucket = &self.buckets[value];
            for key in &bucket.keys {
                let entry = IndexEntry {
                    field: self.field.clone(),
                    primary_key: key.clone(),
                    value: bucket.value.clone(),
                    deleted: false,
                };
                frames.push(encode_plain(&entry.serialize()?));
            }
        }

        let (path, _) = compaction::write_sibling(self.file.path(), frames)?;
        Ok(Some(path))
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Number of (value, key) occurrences currently filed
    pub fn live_entries(&self) -> usize {
        self.buckets.values().map(|bucket| bucket.keys.len()).sum()
    }

    /// Entries in the log file, including deleted ones
    pub fn entries_on_disk(&self) -> u64 {
        self.file.frames()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn append(&mut self, key: &Value, value: &Value, deleted: bool) -> Result<()> {
        let entry = IndexEntry {
            field: self.field.clone(),
            primary_key: key.clone(),
            value: value.clone(),
            deleted,
        };
        self.file.append(&encode_plain(&entry.serialize()?))
    }
}

fn insert(buckets: &mut HashMap<String, Bucket>, key: Value, value: Value) {
    buckets
        .entry(value.to_string())
        .or_insert_with(|| Bucket {
            value,
            keys: Vec::new(),
        })
        .keys
        .push(key);
}

/// Removes only the first matching key, leaving duplicates in place
fn remove_first(buckets: &mut HashMap<String, Bucket>, key: &Value, value: &Value) {
    let name = value.to_string();
    let Some(bucket) = buckets.get_mut(&name) else {
        return;
    };

    let key = key.to_string();
    if let Some(pos) = bucket.keys.iter().position(|k| k.to_string() == key) {
        bucket.keys.remove(pos);
    }
    if bucket.keys.is_empty() {
        buckets.remove(&name);
    }
}
