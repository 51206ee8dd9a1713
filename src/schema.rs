//! Schema Module
//!
//! Describes a record type to the engine: which field is the primary key,
//! whether the store assigns it, and which fields carry a secondary index.
//!
//! A schema is declared once through [`Schema::builder`] and never changes
//! afterwards. Records expose their key and indexed values through the
//! [`Record`] trait instead of runtime field introspection.

use std::collections::HashSet;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ChunkDbError, Result};

// =============================================================================
// Values
// =============================================================================

/// A primary key or indexed field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

impl Value {
    /// The declared kind this value belongs to
    pub fn kind(&self) -> KeyKind {
        match self {
            Value::Str(_) => KeyKind::Str,
            Value::Int(_) => KeyKind::Int,
            Value::Float(_) => KeyKind::Float,
        }
    }

    /// An empty string. Zero numbers are valid keys.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Str(s) if s.is_empty())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// String form used as the map key in the key and index logs
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

/// Declared type of a primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Str,
    Int,
    Float,
}

// =============================================================================
// Record Trait
// =============================================================================

/// A type that can be stored in a table
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct User { id: i64, name: String }
///
/// impl Record for User {
///     const TYPE_NAME: &'static str = "User";
///
///     fn schema() -> Result<Schema> {
///         Schema::builder(Self::TYPE_NAME)
///             .primary_key("id", KeyKind::Int)
///             .auto_increment()
///             .index("name")
///             .build()
///     }
///
///     fn primary_key(&self) -> Value { Value::Int(self.id) }
///     fn set_primary_key(&mut self, key: Value) { self.id = key.as_int().unwrap_or_default() }
///     fn index_value(&self, field: &str) -> Option<Value> {
///         match field {
///             "name" => Some(Value::from(self.name.as_str())),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned {
    /// Registry name; also the table's directory name
    const TYPE_NAME: &'static str;

    /// Field roles, built once at registration
    fn schema() -> Result<Schema>;

    /// Current primary key value
    fn primary_key(&self) -> Value;

    /// Overwrite the primary key (used for auto-increment keys)
    fn set_primary_key(&mut self, key: Value);

    /// Value of an indexed field, `None` for fields the type does not have
    fn index_value(&self, field: &str) -> Option<Value>;
}

// =============================================================================
// Schema Descriptor
// =============================================================================

/// Field roles of one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    type_name: String,
    pk_field: String,
    pk_kind: KeyKind,
    auto_increment: bool,
    indexed_fields: Vec<String>,
}

impl Schema {
    /// Start describing a record type
    pub fn builder(type_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            type_name: type_name.into(),
            primary_key: None,
            auto_increment: false,
            indexed_fields: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn pk_field(&self) -> &str {
        &self.pk_field
    }

    pub fn pk_kind(&self) -> KeyKind {
        self.pk_kind
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn indexed_fields(&self) -> &[String] {
        &self.indexed_fields
    }

    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexed_fields.iter().any(|f| f == field)
    }
}

/// Builder for Schema
#[derive(Debug)]
pub struct SchemaBuilder {
    type_name: String,
    primary_key: Option<(String, KeyKind)>,
    auto_increment: bool,
    indexed_fields: Vec<String>,
}

impl SchemaBuilder {
    /// Declare the primary key field and its type
    pub fn primary_key(mut self, field: impl Into<String>, kind: KeyKind) -> Self {
        self.primary_key = Some((field.into(), kind));
        self
    }

    /// Let the store assign the primary key (requires `KeyKind::Int`)
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Add a secondary index on a field
    pub fn index(mut self, field: impl Into<String>) -> Self {
        self.indexed_fields.push(field.into());
        self
    }

    pub fn build(self) -> Result<Schema> {
        check_name("type name", &self.type_name)?;

        let (pk_field, pk_kind) = self.primary_key.ok_or_else(|| {
            ChunkDbError::Schema(format!("{} declares no primary key", self.type_name))
        })?;

        if self.auto_increment && pk_kind != KeyKind::Int {
            return Err(ChunkDbError::Schema(format!(
                "{}: auto-increment key '{}' must be an integer",
                self.type_name, pk_field
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.indexed_fields {
            check_name("indexed field", field)?;
            if field == &pk_field {
                return Err(ChunkDbError::Schema(format!(
                    "{}: primary key '{}' cannot also be indexed",
                    self.type_name, field
                )));
            }
            // Index files are named by the lowercased field
            if !seen.insert(field.to_lowercase()) {
                return Err(ChunkDbError::Schema(format!(
                    "{}: field '{}' indexed twice",
                    self.type_name, field
                )));
            }
        }

        Ok(Schema {
            type_name: self.type_name,
            pk_field,
            pk_kind,
            auto_increment: self.auto_increment,
            indexed_fields: self.indexed_fields,
        })
    }
}

/// Names end up in file paths
fn check_name(what: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ChunkDbError::Schema(format!("invalid {}: '{}'", what, name)))
    }
}
