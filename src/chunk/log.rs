//! Chunk Log
//!
//! Append-only record storage spread over randomly numbered chunk files.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use rand::Rng;
use tracing::debug;

use crate::compaction;
use crate::config::{Config, SyncStrategy};
use crate::error::{ChunkDbError, Result};
use crate::log::{encode_slotted, FrameKind, LogFile};

use super::naming::{allocate_chunk_id, chunk_path, list_chunk_ids};
use super::Location;

/// Manages the chunk files of one table
///
/// ## State:
/// - `known`: every chunk id with a file on disk
/// - `files` / `data`: handles and resident entries of loaded chunks only
/// - `current`: the chunk accepting appends, picked on the first write
pub struct ChunkLog {
    /// Directory holding the chunk files
    dir: PathBuf,

    /// Live entries per file before rolling
    limit: usize,

    sync_strategy: SyncStrategy,

    /// Chunk ids with a file on disk
    known: BTreeSet<u32>,

    /// Open handles of loaded chunks
    files: HashMap<u32, LogFile>,

    /// Resident entries: chunk id → slot id → encoded record
    data: HashMap<u32, HashMap<u64, Bytes>>,

    /// Chunk accepting appends
    current: Option<u32>,

    /// Preferred append target after reopen (last chunk the key log saw)
    hint: Option<u32>,
}

impl ChunkLog {
    /// Open or create the chunk directory
    ///
    /// No chunk file is read here; files load on first access.
    pub fn open(dir: &Path, config: &Config, hint: Option<u32>) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let known: BTreeSet<u32> = list_chunk_ids(dir)?.into_iter().collect();

        debug!(dir = %dir.display(), chunks = known.len(), "opened chunk log");

        Ok(Self {
            dir: dir.to_path_buf(),
            limit: config.chunk_limit,
            sync_strategy: config.sync_strategy,
            known,
            files: HashMap::new(),
            data: HashMap::new(),
            current: None,
            hint,
        })
    }

    /// Append an encoded record to the current chunk
    ///
    /// Returns the new record's location. The append reaches the file before
    /// the record becomes visible in memory. A chunk may end up holding one
    /// entry over `limit`; the next write syncs it and starts a new chunk.
    pub fn write(&mut self, payload: Vec<u8>) -> Result<Location> {
        let chunk_id = self.activate_current()?;
        let slot_id = self.allocate_slot(chunk_id);

        let frame = encode_slotted(slot_id, &payload);
        self.file_mut(chunk_id)?.append(&frame)?;

        self.data
            .entry(chunk_id)
            .or_default()
            .insert(slot_id, Bytes::from(payload));

        Ok(Location::new(chunk_id, slot_id))
    }

    /// Read an encoded record, loading its chunk file if needed
    ///
    /// Returns `None` if the slot is absent or deleted.
    pub fn read(&mut self, location: Location) -> Result<Option<Bytes>> {
        self.ensure_loaded(location.chunk_id)?;
        Ok(self
            .data
            .get(&location.chunk_id)
            .and_then(|entries| entries.get(&location.slot_id))
            .cloned())
    }

    /// Remove a record from memory
    ///
    /// The bytes on disk stay until compaction. Returns whether the slot was
    /// live.
    pub fn delete(&mut self, location: Location) -> Result<bool> {
        self.ensure_loaded(location.chunk_id)?;
        Ok(self
            .data
            .get_mut(&location.chunk_id)
            .map_or(false, |entries| entries.remove(&location.slot_id).is_some()))
    }

    /// Replace a record: append the new encoding, then drop the old slot
    ///
    /// The new entry goes to the current chunk, which need not be the chunk
    /// of the old one. Callers must store the returned location.
    pub fn update(&mut self, payload: Vec<u8>, old: Location) -> Result<Location> {
        let new = self.write(payload)?;
        if let Some(entries) = self.data.get_mut(&old.chunk_id) {
            entries.remove(&old.slot_id);
        }
        Ok(new)
    }

    /// Force sync of every open chunk file
    pub fn flush(&self) -> Result<()> {
        for file in self.files.values() {
            file.sync()?;
        }
        Ok(())
    }

    // =========================================================================
    // Compaction
    // =========================================================================

    /// Rewrite resident chunk files that carry enough dead entries
    ///
    /// `live` maps chunk id → slot ids referenced by the key log. A resident
    /// file is rewritten to its `.opm` sibling when its live entries are at
    /// most `live_ratio` of the frames it holds on disk. Unreferenced entries
    /// are dropped from memory as well. Returns the siblings written.
    pub fn optimize(
        &mut self,
        live: &HashMap<u32, HashSet<u64>>,
        live_ratio: f64,
    ) -> Result<Vec<PathBuf>> {
        let empty = HashSet::new();
        let mut written = Vec::new();

        let mut resident: Vec<u32> = self.data.keys().copied().collect();
        resident.sort_unstable();

        for chunk_id in resident {
            let referenced = live.get(&chunk_id).unwrap_or(&empty);
            let on_disk = self.files.get(&chunk_id).map_or(0, |f| f.frames());

            let entries = match self.data.get_mut(&chunk_id) {
                Some(entries) => entries,
                None => continue,
            };
            entries.retain(|slot, _| referenced.contains(slot));
            let kept = entries.len() as u64;

            if on_disk == 0 || kept == on_disk {
                continue;
            }
            if kept as f64 > live_ratio * on_disk as f64 {
                debug!(chunk = chunk_id, kept, on_disk, "chunk mostly live, not rewriting");
                continue;
            }

            let mut slots: Vec<(&u64, &Bytes)> = entries.iter().collect();
            slots.sort_unstable_by_key(|(slot, _)| **slot);
            let frames = slots
                .into_iter()
                .map(|(slot, payload)| encode_slotted(*slot, payload));

            let (path, _) = compaction::write_sibling(&chunk_path(&self.dir, chunk_id), frames)?;
            debug!(chunk = chunk_id, kept, on_disk, "rewrote chunk");
            written.push(path);
        }

        Ok(written)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// The chunk accepting appends, if one has been picked yet
    pub fn current_chunk(&self) -> Option<u32> {
        self.current
    }

    /// Chunk ids with a file on disk
    pub fn chunk_ids(&self) -> Vec<u32> {
        self.known.iter().copied().collect()
    }

    /// Chunk ids whose entries are in memory
    pub fn resident_chunks(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.data.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_resident(&self, chunk_id: u32) -> bool {
        self.data.contains_key(&chunk_id)
    }

    /// Live entries of a resident chunk (0 if not loaded)
    pub fn live_count(&self, chunk_id: u32) -> usize {
        self.data.get(&chunk_id).map_or(0, HashMap::len)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Pick the append target for the next write
    ///
    /// Keeps the current chunk while it is within `limit`, else syncs it and
    /// starts a new one. On first write the hinted chunk is reused if it
    /// still has room.
    fn activate_current(&mut self) -> Result<u32> {
        if let Some(current) = self.current {
            if self.live_count(current) <= self.limit {
                return Ok(current);
            }
            if let Some(file) = self.files.get(&current) {
                file.sync()?;
            }
            debug!(chunk = current, "chunk over limit, rolling");
            return self.roll();
        }

        if let Some(hint) = self.hint.take() {
            if self.known.contains(&hint) {
                self.ensure_loaded(hint)?;
                if self.live_count(hint) <= self.limit {
                    debug!(chunk = hint, "resuming appends to chunk");
                    self.current = Some(hint);
                    return Ok(hint);
                }
            }
        }

        self.roll()
    }

    /// Create a new randomly numbered chunk file and make it current
    fn roll(&mut self) -> Result<u32> {
        let taken: HashSet<u32> = self.known.iter().copied().collect();
        let chunk_id = allocate_chunk_id(&self.dir, &taken, &mut rand::thread_rng())?;

        let file = LogFile::open(&chunk_path(&self.dir, chunk_id), self.sync_strategy)?;
        self.known.insert(chunk_id);
        self.files.insert(chunk_id, file);
        self.data.insert(chunk_id, HashMap::new());

        debug!(previous = ?self.current, chunk = chunk_id, "rolled to new chunk");
        self.current = Some(chunk_id);
        Ok(chunk_id)
    }

    /// Load a whole chunk file into memory unless already resident
    fn ensure_loaded(&mut self, chunk_id: u32) -> Result<()> {
        if self.data.contains_key(&chunk_id) {
            return Ok(());
        }

        let path = chunk_path(&self.dir, chunk_id);
        if !self.known.contains(&chunk_id) || !path.is_file() {
            return Err(ChunkDbError::Corruption(format!(
                "chunk file is missing: {}",
                path.display()
            )));
        }

        let mut file = LogFile::open(&path, self.sync_strategy)?;
        let mut entries = HashMap::new();
        let result = file.replay(FrameKind::Slotted, |frame| {
            if let Some(slot) = frame.slot {
                entries.insert(slot, Bytes::from(frame.payload));
            }
            Ok(())
        })?;

        debug!(
            chunk = chunk_id,
            frames = result.frames,
            entries = entries.len(),
            "loaded chunk file"
        );

        self.files.insert(chunk_id, file);
        self.data.insert(chunk_id, entries);
        Ok(())
    }

    /// Random 63-bit slot id not live in the chunk
    fn allocate_slot(&self, chunk_id: u32) -> u64 {
        let mut rng = rand::thread_rng();
        let entries = self.data.get(&chunk_id);
        loop {
            let slot = rng.gen::<u64>() >> 1;
            if entries.map_or(true, |e| !e.contains_key(&slot)) {
                return slot;
            }
        }
    }

    fn file_mut(&mut self, chunk_id: u32) -> Result<&mut LogFile> {
        self.files.get_mut(&chunk_id).ok_or_else(|| {
            ChunkDbError::Storage(format!("chunk {} has no open file", chunk_id))
        })
    }
}
