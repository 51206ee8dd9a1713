//! Query Module
//!
//! Equality queries over secondary indexes.
//!
//! ```text
//! storage.query::<User>()
//!     .eq("city", "Oslo")      ─┐
//!     .eq("role", "admin")     ─┴─ keys in every condition's bucket
//!     .page(2, 10)             ─── positions [10, 20) of that key list
//!     .fetch()?                ─── records, in key-list order
//! ```
//!
//! Conditions are intersected in the order of the first condition's keys.
//! A key listed more than once in a bucket yields one record.

use std::collections::HashSet;
use std::marker::PhantomData;

use crate::codec::Encoder;
use crate::error::Result;
use crate::schema::{Record, Value};
use crate::storage::Storage;

/// An equality query against the indexes of `R`
pub struct Query<'a, R, E: Encoder> {
    storage: &'a Storage<E>,

    /// (field, value) pairs, all of which must match
    conditions: Vec<(String, Value)>,

    /// Half-open window of result positions
    window: Option<(usize, usize)>,

    _record: PhantomData<R>,
}

impl<'a, R: Record, E: Encoder> Query<'a, R, E> {
    pub(crate) fn new(storage: &'a Storage<E>) -> Self {
        Self {
            storage,
            conditions: Vec::new(),
            window: None,
            _record: PhantomData,
        }
    }

    /// Require indexed `field` to equal `value`
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Keep the first `n` results
    pub fn limit(mut self, n: usize) -> Self {
        self.window = Some((0, n));
        self
    }

    /// Keep page `page` (1-based) of `size` results
    ///
    /// Page and size below 1 are treated as 1.
    pub fn page(mut self, page: usize, size: usize) -> Self {
        let page = page.max(1);
        let size = size.max(1);
        let start = (page - 1).saturating_mul(size);
        self.window = Some((start, start.saturating_add(size)));
        self
    }

    /// Matching keys after windowing
    ///
    /// A query with no conditions matches nothing.
    pub fn keys(&self) -> Result<Vec<Value>> {
        Ok(self.apply_window(self.matching_keys()?))
    }

    /// Fetch the matching records
    ///
    /// Keys whose record has gone missing are skipped, so a page can come
    /// back short.
    pub fn fetch(&self) -> Result<Vec<R>> {
        let keys = self.keys()?;
        let encoder = self.storage.encoder();
        self.storage
            .with_table::<R, _, _>(|table| table.get_many(encoder, &keys))
    }

    /// Number of matching keys, ignoring the window
    pub fn count(&self) -> Result<usize> {
        Ok(self.matching_keys()?.len())
    }

    /// Intersection of every condition's keys
    fn matching_keys(&self) -> Result<Vec<Value>> {
        let lists = self.storage.with_table::<R, _, _>(|table| {
            self.conditions
                .iter()
                .map(|(field, value)| table.index_keys(field, value))
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(intersect(lists))
    }

    fn apply_window(&self, keys: Vec<Value>) -> Vec<Value> {
        match self.window {
            None => keys,
            Some((start, end)) => {
                if start >= keys.len() {
                    return Vec::new();
                }
                let end = end.min(keys.len());
                keys[start..end].to_vec()
            }
        }
    }
}

/// Keys present in every list, in the order of the first, without repeats
fn intersect(lists: Vec<Vec<Value>>) -> Vec<Value> {
    let mut lists = lists.into_iter();
    let Some(first) = lists.next() else {
        return Vec::new();
    };

    let others: Vec<HashSet<String>> = lists
        .map(|list| list.iter().map(|key| key.to_string()).collect())
        .collect();

    let mut seen = HashSet::new();
    first
        .into_iter()
        .filter(|key| {
            let name = key.to_string();
            others.iter().all(|set| set.contains(&name)) && seen.insert(name)
        })
        .collect()
}
