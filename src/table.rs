//! Table Module
//!
//! One registered record type: a key log, a chunk log and one index log per
//! indexed field, kept consistent with each other.
//!
//! ## Write order
//! Insert: assign key → write chunk (the key entry needs the location) →
//! write key entry → write index entries. Each log appends to disk before it
//! updates memory, so a failed step leaves that log's in-memory view as it
//! was.
//!
//! ## Concurrency
//! A table has no internal locking; `Storage` wraps each one in a mutex.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::chunk::ChunkLog;
use crate::codec::Encoder;
use crate::compaction::{self, ApplyReport, OptimizeReport};
use crate::config::Config;
use crate::error::{ChunkDbError, Result};
use crate::index::IndexLog;
use crate::keys::KeyLog;
use crate::schema::{Record, Schema, Value};

/// Storage for one record type
pub struct Table {
    schema: Schema,

    /// `{data_dir}/{TYPE_NAME}`
    dir: PathBuf,

    keys: KeyLog,
    chunks: ChunkLog,

    /// Parallel to `schema.indexed_fields()`
    indexes: Vec<IndexLog>,

    optimize_live_ratio: f64,
}

impl Table {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const DATA_DIR: &'static str = "_data";
    const KEY_DIR: &'static str = "_pk";
    const INDEX_DIR: &'static str = "_idx";

    /// Open or create the table for `schema` under `root`
    ///
    /// On startup:
    /// 1. Create the table directory
    /// 2. Adopt newer compaction rewrites (if `config.apply_on_open`)
    /// 3. Replay the key log and every index log
    /// 4. Register chunk files without reading them
    pub fn open(root: &Path, schema: Schema, config: &Config) -> Result<Self> {
        let dir = root.join(schema.type_name());
        fs::create_dir_all(&dir)?;

        if config.apply_on_open {
            let report = Self::apply_optimized(&dir)?;
            if !report.adopted.is_empty() {
                info!(
                    table = schema.type_name(),
                    adopted = report.adopted.len(),
                    "adopted compacted files"
                );
            }
        }

        let keys = KeyLog::open(
            &dir.join(Self::KEY_DIR),
            schema.is_auto_increment(),
            config,
        )?;
        let chunks = ChunkLog::open(&dir.join(Self::DATA_DIR), config, keys.last_chunk())?;

        let index_dir = dir.join(Self::INDEX_DIR);
        let indexes = schema
            .indexed_fields()
            .iter()
            .map(|field| IndexLog::open(&index_dir, field, config))
            .collect::<Result<Vec<_>>>()?;

        info!(
            table = schema.type_name(),
            live_keys = keys.live_count(),
            chunk_files = chunks.chunk_ids().len(),
            indexes = indexes.len(),
            "opened table"
        );

        Ok(Self {
            schema,
            dir,
            keys,
            chunks,
            indexes,
            optimize_live_ratio: config.optimize_live_ratio,
        })
    }

    /// Adopt rewrites in every log directory of the table at `dir`
    ///
    /// Must run while no `Table` for `dir` is open.
    pub fn apply_optimized(dir: &Path) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        for sub in [Self::DATA_DIR, Self::KEY_DIR, Self::INDEX_DIR] {
            report.merge(compaction::apply_dir(&dir.join(sub))?);
        }
        Ok(report)
    }

    /// Insert a new record
    ///
    /// For auto-increment tables the assigned key is written into `record`.
    /// Returns the record's key.
    pub fn insert<R: Record, E: Encoder>(&mut self, encoder: &E, record: &mut R) -> Result<Value> {
        let values = self.index_values(&*record)?;

        let key = self
            .keys
            .assign(&record.primary_key(), self.schema.pk_kind())?;
        if self.schema.is_auto_increment() {
            record.set_primary_key(key.clone());
        }

        let payload = encoder.encode(&*record)?;
        let location = self.chunks.write(payload)?;
        self.keys.put(&key, location)?;

        for (index, value) in self.indexes.iter_mut().zip(&values) {
            index.put(&key, value)?;
        }

        Ok(key)
    }

    /// Fetch a record by key
    ///
    /// A key of the wrong kind is rejected rather than reported missing.
    pub fn get<R: Record, E: Encoder>(&mut self, encoder: &E, key: &Value) -> Result<R> {
        self.check_key_kind(key)?;
        let location = self.keys.get(key).ok_or(ChunkDbError::NotFound)?;
        let bytes = self
            .chunks
            .read(location)?
            .ok_or(ChunkDbError::NotFound)?;
        encoder.decode(&bytes)
    }

    /// Replace a stored record with `record`, matched by its key
    ///
    /// Index entries move only for fields whose value changed.
    pub fn set<R: Record, E: Encoder>(&mut self, encoder: &E, record: &R) -> Result<()> {
        let key = record.primary_key();
        self.check_key_set(&key)?;

        let old_location = self.keys.get(&key).ok_or(ChunkDbError::NotFound)?;
        let old_bytes = self
            .chunks
            .read(old_location)?
            .ok_or(ChunkDbError::NotFound)?;
        let old: R = encoder.decode(&old_bytes)?;

        let old_values = self.index_values(&old)?;
        let new_values = self.index_values(record)?;

        let payload = encoder.encode(record)?;
        let location = self.chunks.update(payload, old_location)?;
        self.keys.put(&key, location)?;

        for ((index, old), new) in self.indexes.iter_mut().zip(&old_values).zip(&new_values) {
            index.set(&key, old, new)?;
        }

        Ok(())
    }

    /// Delete a record by key
    pub fn delete<R: Record, E: Encoder>(&mut self, encoder: &E, key: &Value) -> Result<()> {
        self.check_key_set(key)?;

        let location = self.keys.get(key).ok_or(ChunkDbError::NotFound)?;

        // Index entries are filed under the record's values
        let values = match self.chunks.read(location)? {
            Some(bytes) => {
                let record: R = encoder.decode(&bytes)?;
                Some(self.index_values(&record)?)
            }
            None => {
                warn!(
                    table = self.schema.type_name(),
                    key = %key,
                    "live key points at a missing record, index entries left in place"
                );
                None
            }
        };

        self.keys.delete(key)?;
        self.chunks.delete(location)?;

        if let Some(values) = values {
            for (index, value) in self.indexes.iter_mut().zip(&values) {
                index.delete(key, value)?;
            }
        }

        Ok(())
    }

    /// Keys filed under `value` in the index of `field`
    pub fn index_keys(&self, field: &str, value: &Value) -> Result<Vec<Value>> {
        Ok(self.index(field)?.get(value))
    }

    /// Records whose `field` equals `value`
    ///
    /// Keys whose record has gone missing are skipped.
    pub fn find<R: Record, E: Encoder>(
        &mut self,
        encoder: &E,
        field: &str,
        value: &Value,
    ) -> Result<Vec<R>> {
        let keys = self.index_keys(field, value)?;
        self.get_many(encoder, &keys)
    }

    /// Fetch each key in order, skipping missing ones
    pub fn get_many<R: Record, E: Encoder>(&mut self, encoder: &E, keys: &[Value]) -> Result<Vec<R>> {
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            match self.get(encoder, key) {
                Ok(record) => records.push(record),
                Err(ChunkDbError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    /// Write compacted siblings for every log with reclaimable space
    ///
    /// Only chunk files already in memory are considered. Originals are not
    /// touched; see [`Table::apply_optimized`].
    pub fn optimize(&mut self) -> Result<OptimizeReport> {
        self.flush()?;

        let mut live: HashMap<u32, HashSet<u64>> = HashMap::new();
        for (_, location) in self.keys.live_locations() {
            live.entry(location.chunk_id)
                .or_default()
                .insert(location.slot_id);
        }

        let mut report = OptimizeReport::default();
        report
            .rewritten
            .extend(self.chunks.optimize(&live, self.optimize_live_ratio)?);
        report.rewritten.extend(self.keys.optimize()?);
        for index in &mut self.indexes {
            report.rewritten.extend(index.optimize()?);
        }

        Ok(report)
    }

    /// Force sync of every log
    pub fn flush(&self) -> Result<()> {
        self.keys.flush()?;
        self.chunks.flush()?;
        for index in &self.indexes {
            index.flush()?;
        }
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.keys.live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.live_count() == 0
    }

    pub fn key_log(&self) -> &KeyLog {
        &self.keys
    }

    pub fn chunk_log(&self) -> &ChunkLog {
        &self.chunks
    }

    pub fn index_log(&self, field: &str) -> Option<&IndexLog> {
        self.index(field).ok()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn index(&self, field: &str) -> Result<&IndexLog> {
        self.schema
            .indexed_fields()
            .iter()
            .position(|f| f == field)
            .map(|pos| &self.indexes[pos])
            .ok_or_else(|| {
                ChunkDbError::Schema(format!(
                    "{}: field '{}' is not indexed",
                    self.schema.type_name(),
                    field
                ))
            })
    }

    /// Values of the indexed fields, in schema order
    fn index_values<R: Record>(&self, record: &R) -> Result<Vec<Value>> {
        self.schema
            .indexed_fields()
            .iter()
            .map(|field| {
                record.index_value(field).ok_or_else(|| {
                    ChunkDbError::Schema(format!(
                        "{}: record has no value for indexed field '{}'",
                        self.schema.type_name(),
                        field
                    ))
                })
            })
            .collect()
    }

    fn check_key_kind(&self, key: &Value) -> Result<()> {
        if key.kind() != self.schema.pk_kind() {
            return Err(ChunkDbError::InvalidKey(format!(
                "expected {:?} key, got {:?}",
                self.schema.pk_kind(),
                key.kind()
            )));
        }
        Ok(())
    }

    /// Update and delete need a key the caller actually set
    fn check_key_set(&self, key: &Value) -> Result<()> {
        self.check_key_kind(key)?;
        if key.is_empty() {
            return Err(ChunkDbError::InvalidKey("primary key not set".to_string()));
        }
        // Auto-increment keys start at 1, so zero means unset
        if self.schema.is_auto_increment() && key.as_int().map_or(false, |v| v <= 0) {
            return Err(ChunkDbError::InvalidKey("primary key not set".to_string()));
        }
        Ok(())
    }
}
