//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Once;
use std::thread;
use std::time::Duration;

use chunkdb::{Config, KeyKind, Record, Result, Schema, Storage, Value};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// =============================================================================
// Logging
// =============================================================================

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness (`RUST_LOG=debug`)
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// =============================================================================
// Helper Functions
// =============================================================================

pub fn setup_temp_dir() -> (TempDir, PathBuf) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

pub fn test_config(path: &Path) -> Config {
    Config::builder().data_dir(path).build()
}

pub fn small_chunk_config(path: &Path, limit: usize) -> Config {
    Config::builder().data_dir(path).chunk_limit(limit).build()
}

/// Open a store with `User` and `Group` registered
pub fn open_storage(config: Config) -> Storage {
    let storage = Storage::open(config).unwrap();
    storage.register::<User>().unwrap();
    storage.register::<Group>().unwrap();
    storage
}

/// Let file modification times move past the last append
pub fn settle_mtime() {
    thread::sleep(Duration::from_millis(50));
}

// =============================================================================
// Record Types
// =============================================================================

/// Auto-increment key, indexed on `email` and `city`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub city: String,
}

impl User {
    pub fn new(name: &str, city: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            city: city.to_string(),
        }
    }
}

impl Record for User {
    const TYPE_NAME: &'static str = "User";

    fn schema() -> Result<Schema> {
        Schema::builder(Self::TYPE_NAME)
            .primary_key("id", KeyKind::Int)
            .auto_increment()
            .index("email")
            .index("city")
            .build()
    }

    fn primary_key(&self) -> Value {
        Value::Int(self.id)
    }

    fn set_primary_key(&mut self, key: Value) {
        self.id = key.as_int().unwrap_or_default();
    }

    fn index_value(&self, field: &str) -> Option<Value> {
        match field {
            "email" => Some(Value::from(self.email.as_str())),
            "city" => Some(Value::from(self.city.as_str())),
            _ => None,
        }
    }
}

/// Caller-chosen string key, indexed on `owner`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub owner: String,
    pub members: u32,
}

impl Group {
    pub fn new(name: &str, owner: &str) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.to_string(),
            members: 1,
        }
    }
}

impl Record for Group {
    const TYPE_NAME: &'static str = "Group";

    fn schema() -> Result<Schema> {
        Schema::builder(Self::TYPE_NAME)
            .primary_key("name", KeyKind::Str)
            .index("owner")
            .build()
    }

    fn primary_key(&self) -> Value {
        Value::from(self.name.as_str())
    }

    fn set_primary_key(&mut self, key: Value) {
        if let Value::Str(name) = key {
            self.name = name;
        }
    }

    fn index_value(&self, field: &str) -> Option<Value> {
        match field {
            "owner" => Some(Value::from(self.owner.as_str())),
            _ => None,
        }
    }
}

/// Integer key chosen by the caller, no indexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub seq: i64,
    pub celsius: f64,
}

impl Record for Reading {
    const TYPE_NAME: &'static str = "Reading";

    fn schema() -> Result<Schema> {
        Schema::builder(Self::TYPE_NAME)
            .primary_key("seq", KeyKind::Int)
            .build()
    }

    fn primary_key(&self) -> Value {
        Value::Int(self.seq)
    }

    fn set_primary_key(&mut self, key: Value) {
        self.seq = key.as_int().unwrap_or_default();
    }

    fn index_value(&self, _field: &str) -> Option<Value> {
        None
    }
}

/// Float key chosen by the caller, indexed on `vendor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub label: String,
    pub vendor: String,
}

impl Price {
    pub fn new(amount: f64, label: &str, vendor: &str) -> Self {
        Self {
            amount,
            label: label.to_string(),
            vendor: vendor.to_string(),
        }
    }
}

impl Record for Price {
    const TYPE_NAME: &'static str = "Price";

    fn schema() -> Result<Schema> {
        Schema::builder(Self::TYPE_NAME)
            .primary_key("amount", KeyKind::Float)
            .index("vendor")
            .build()
    }

    fn primary_key(&self) -> Value {
        Value::Float(self.amount)
    }

    fn set_primary_key(&mut self, key: Value) {
        self.amount = key.as_float().unwrap_or_default();
    }

    fn index_value(&self, field: &str) -> Option<Value> {
        match field {
            "vendor" => Some(Value::from(self.vendor.as_str())),
            _ => None,
        }
    }
}
