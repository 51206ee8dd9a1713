//! Configuration for chunkdb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{ChunkDbError, Result};

/// Main configuration for a chunkdb instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {TypeName}/
    ///           ├── _data/dataNNN.dat   (chunk files)
    ///           ├── _pk/pk.pk           (key log)
    ///           ├── _pk/auto.pk         (auto-increment counter)
    ///           └── _idx/{field}.idx    (one index log per field)
    pub data_dir: PathBuf,

    /// Live entries a chunk file may hold before a new one becomes current
    pub chunk_limit: usize,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync log appends
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// A resident chunk file is rewritten by `optimize` only when its live
    /// entries are at most this fraction of the entries on disk
    pub optimize_live_ratio: f64,

    /// Adopt newer `*.opm` rewrites when a table is opened
    pub apply_on_open: bool,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync when a chunk file rolls, on `flush()` and after compaction
    OnFlush,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./chunkdb_data"),
            chunk_limit: 1024,
            sync_strategy: SyncStrategy::OnFlush,
            optimize_live_ratio: 0.9,
            apply_on_open: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_limit == 0 {
            return Err(ChunkDbError::Config(
                "chunk_limit must be at least 1".to_string(),
            ));
        }
        if !(self.optimize_live_ratio > 0.0 && self.optimize_live_ratio <= 1.0) {
            return Err(ChunkDbError::Config(format!(
                "optimize_live_ratio must be in (0, 1], got {}",
                self.optimize_live_ratio
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the live-entry limit per chunk file
    pub fn chunk_limit(mut self, limit: usize) -> Self {
        self.config.chunk_limit = limit;
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the live ratio under which optimize rewrites a chunk file
    pub fn optimize_live_ratio(mut self, ratio: f64) -> Self {
        self.config.optimize_live_ratio = ratio;
        self
    }

    /// Enable or disable adopting `*.opm` rewrites on open
    pub fn apply_on_open(mut self, apply: bool) -> Self {
        self.config.apply_on_open = apply;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
