//! Storage Module
//!
//! Entry point of the store: a registry of tables, one per record type.
//!
//! ## Responsibilities
//! - Register record types and open their tables
//! - Route record operations to the table of the record's type
//! - Run optimize / apply across every registered table
//!
//! ## Concurrency Model
//!
//! - The registry is behind a `RwLock`: operations take the read side to
//!   look up a table, `register` and `apply_optimized` take the write side
//! - Each table is behind its own `Mutex`, so operations on one type are
//!   serialized while different types proceed in parallel
//!
//! ```text
//!   Storage ──RwLock──► { "User"  → Mutex<Table> ─► _pk/ _data/ _idx/
//!                         "Group" → Mutex<Table> ─► _pk/ _data/ _idx/ }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::codec::{BincodeEncoder, Encoder};
use crate::compaction::{ApplyReport, OptimizeReport};
use crate::config::Config;
use crate::error::{ChunkDbError, Result};
use crate::query::Query;
use crate::schema::{Record, Schema, Value};
use crate::table::Table;

/// An embedded store of typed records
pub struct Storage<E: Encoder = BincodeEncoder> {
    config: Config,
    encoder: E,

    /// Type name → table
    tables: RwLock<HashMap<String, Arc<Mutex<Table>>>>,
}

impl Storage<BincodeEncoder> {
    /// Open a store that encodes records with bincode
    pub fn open(config: Config) -> Result<Self> {
        Self::with_encoder(config, BincodeEncoder)
    }

    /// Open a store at `path` with default settings
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }
}

impl<E: Encoder> Storage<E> {
    /// Open a store that encodes records with `encoder`
    ///
    /// No table is opened until its type is registered.
    pub fn with_encoder(config: Config, encoder: E) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        info!(
            data_dir = %config.data_dir.display(),
            chunk_limit = config.chunk_limit,
            "opened storage"
        );

        Ok(Self {
            config,
            encoder,
            tables: RwLock::new(HashMap::new()),
        })
    }

    /// Register a record type, opening (or creating) its table
    ///
    /// Registering the same schema again is a no-op. Registering a different
    /// schema under an existing type name fails.
    pub fn register<R: Record>(&self) -> Result<()> {
        let schema = R::schema()?;
        if schema.type_name() != R::TYPE_NAME {
            return Err(ChunkDbError::Schema(format!(
                "schema names type '{}' but record declares '{}'",
                schema.type_name(),
                R::TYPE_NAME
            )));
        }

        let mut tables = self.tables.write();
        if let Some(existing) = tables.get(R::TYPE_NAME) {
            if existing.lock().schema() == &schema {
                return Ok(());
            }
            return Err(ChunkDbError::Schema(format!(
                "type '{}' is already registered with a different schema",
                R::TYPE_NAME
            )));
        }

        let table = Table::open(&self.config.data_dir, schema, &self.config)?;
        tables.insert(R::TYPE_NAME.to_string(), Arc::new(Mutex::new(table)));
        Ok(())
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Insert a new record and return its key
    ///
    /// Auto-increment types get their key written back into `record`.
    pub fn put<R: Record>(&self, record: &mut R) -> Result<Value> {
        let table = self.table::<R>()?;
        let mut table = table.lock();
        table.insert(&self.encoder, record)
    }

    /// Fetch a record by key
    pub fn get<R: Record>(&self, key: impl Into<Value>) -> Result<R> {
        let key = key.into();
        let table = self.table::<R>()?;
        let mut table = table.lock();
        table.get(&self.encoder, &key)
    }

    /// Overwrite `record` with the stored record of the same key
    pub fn fill<R: Record>(&self, record: &mut R) -> Result<()> {
        *record = self.get(record.primary_key())?;
        Ok(())
    }

    /// Replace the stored record with the same key as `record`
    pub fn update<R: Record>(&self, record: &R) -> Result<()> {
        let table = self.table::<R>()?;
        let mut table = table.lock();
        table.set(&self.encoder, record)
    }

    /// Delete the stored record with the same key as `record`
    pub fn delete<R: Record>(&self, record: &R) -> Result<()> {
        self.delete_by_key::<R>(record.primary_key())
    }

    /// Delete a record by key
    pub fn delete_by_key<R: Record>(&self, key: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let table = self.table::<R>()?;
        let mut table = table.lock();
        table.delete::<R, E>(&self.encoder, &key)
    }

    /// Records whose indexed `field` equals `value`
    pub fn find_by_index<R: Record>(&self, field: &str, value: impl Into<Value>) -> Result<Vec<R>> {
        let value = value.into();
        let table = self.table::<R>()?;
        let mut table = table.lock();
        table.find(&self.encoder, field, &value)
    }

    /// Start an equality query over the indexes of `R`
    pub fn query<R: Record>(&self) -> Query<'_, R, E> {
        Query::new(self)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Write compacted siblings for every registered table
    ///
    /// Originals stay in use until [`Storage::apply_optimized`].
    pub fn optimize(&self) -> Result<OptimizeReport> {
        let mut report = OptimizeReport::default();
        for (name, table) in self.snapshot() {
            let table_report = table.lock().optimize()?;
            debug!(table = %name, rewritten = table_report.rewritten.len(), "optimized table");
            report.merge(table_report);
        }
        Ok(report)
    }

    /// Adopt compacted siblings newer than their originals
    ///
    /// Every table is closed, its directories are applied, and it is
    /// reopened. No other operation may be in flight, and no caller may hold
    /// a table handle across this call.
    ///
    /// If a directory fails to apply, every table is still reopened before
    /// the first error is returned, so the registry keeps all its types.
    pub fn apply_optimized(&self) -> Result<ApplyReport> {
        let mut tables = self.tables.write();

        let mut schemas: Vec<Schema> = tables
            .values()
            .map(|table| table.lock().schema().clone())
            .collect();
        schemas.sort_by(|a, b| a.type_name().cmp(b.type_name()));
        // Dropping the tables closes their files
        tables.clear();

        let mut report = ApplyReport::default();
        let mut failure = None;
        for schema in &schemas {
            match Table::apply_optimized(&self.config.data_dir.join(schema.type_name())) {
                Ok(table_report) => report.merge(table_report),
                Err(e) => {
                    warn!(table = schema.type_name(), error = %e, "failed to apply compacted files");
                    failure.get_or_insert(e);
                }
            }
        }

        let reopen = Config {
            apply_on_open: false,
            ..self.config.clone()
        };
        for schema in schemas {
            let name = schema.type_name().to_string();
            match Table::open(&self.config.data_dir, schema, &reopen) {
                Ok(table) => {
                    tables.insert(name, Arc::new(Mutex::new(table)));
                }
                Err(e) => {
                    warn!(table = %name, error = %e, "failed to reopen table");
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        info!(
            adopted = report.adopted.len(),
            stale = report.stale.len(),
            orphaned = report.orphaned.len(),
            "applied compacted files"
        );
        Ok(report)
    }

    /// Force sync of every registered table
    pub fn flush(&self) -> Result<()> {
        for (_, table) in self.snapshot() {
            table.lock().flush()?;
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Names of the registered types, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Run `f` with exclusive access to the table of `R`
    pub fn with_table<R, T, F>(&self, f: F) -> Result<T>
    where
        R: Record,
        F: FnOnce(&mut Table) -> Result<T>,
    {
        let table = self.table::<R>()?;
        let mut table = table.lock();
        f(&mut table)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn table<R: Record>(&self) -> Result<Arc<Mutex<Table>>> {
        self.tables
            .read()
            .get(R::TYPE_NAME)
            .cloned()
            .ok_or_else(|| ChunkDbError::UnregisteredType(R::TYPE_NAME.to_string()))
    }

    /// Handles of every table, sorted by type name
    fn snapshot(&self) -> Vec<(String, Arc<Mutex<Table>>)> {
        let mut tables: Vec<_> = self
            .tables
            .read()
            .iter()
            .map(|(name, table)| (name.clone(), Arc::clone(table)))
            .collect();
        tables.sort_by(|a, b| a.0.cmp(&b.0));
        tables
    }
}
