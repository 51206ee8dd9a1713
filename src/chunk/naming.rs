//! Chunk file naming
//!
//! Chunk files are named `data{id}.dat` with a randomly chosen id.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::{ChunkDbError, Result};

const FILE_PREFIX: &str = "data";
const FILE_SUFFIX: &str = ".dat";

/// Random ids are drawn from `0..RANDOM_ID_RANGE`
pub(crate) const RANDOM_ID_RANGE: u32 = 1000;

/// Random draws before falling back to counter-based ids
pub(crate) const MAX_RANDOM_ATTEMPTS: usize = 32;

/// Generate the file path for a chunk with given id
pub fn chunk_path(dir: &Path, id: u32) -> PathBuf {
    dir.join(format!("{}{}{}", FILE_PREFIX, id, FILE_SUFFIX))
}

/// Parse a chunk id from a filename
/// "data42.dat" → Some(42), "data42.dat.opm" → None
pub fn parse_chunk_id(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let id_str = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    id_str.parse().ok()
}

/// Discover chunk files in a directory, sorted by id
pub fn list_chunk_ids(dir: &Path) -> Result<Vec<u32>> {
    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            if let Some(id) = parse_chunk_id(&path) {
                ids.push(id);
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Pick an id for a new chunk file
///
/// Draws random ids, rejecting any in `taken` or already on disk. After
/// `MAX_RANDOM_ATTEMPTS` misses it switches to a counter one range above the
/// largest known id, still with a random suffix, so a crowded directory
/// cannot loop forever.
pub(crate) fn allocate_chunk_id<R: Rng>(dir: &Path, taken: &HashSet<u32>, rng: &mut R) -> Result<u32> {
    let is_free = |id: u32| !taken.contains(&id) && !chunk_path(dir, id).exists();

    for _ in 0..MAX_RANDOM_ATTEMPTS {
        let id = rng.gen_range(0..RANDOM_ID_RANGE);
        if is_free(id) {
            return Ok(id);
        }
    }

    let highest = taken.iter().copied().max().unwrap_or(0);
    let mut base = (highest / RANDOM_ID_RANGE + 1)
        .checked_mul(RANDOM_ID_RANGE)
        .ok_or_else(|| ChunkDbError::Storage("chunk id space exhausted".to_string()))?;

    loop {
        for _ in 0..MAX_RANDOM_ATTEMPTS {
            let id = base
                .checked_add(rng.gen_range(0..RANDOM_ID_RANGE))
                .ok_or_else(|| ChunkDbError::Storage("chunk id space exhausted".to_string()))?;
            if is_free(id) {
                return Ok(id);
            }
        }
        base = base
            .checked_add(RANDOM_ID_RANGE)
            .ok_or_else(|| ChunkDbError::Storage("chunk id space exhausted".to_string()))?;
    }
}
