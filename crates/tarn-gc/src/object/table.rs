//! Hash table payload

use std::mem;

use rustc_hash::FxHashMap;

use crate::value::Value;

/// Mutable hash table keyed by value identity
///
/// Storing nil removes the key, so a table never holds a nil value.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: FxHashMap<Value, Value>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Look up a key; missing keys read as nil
    pub fn get(&self, key: &Value) -> Value {
        self.entries.get(key).copied().unwrap_or(Value::Nil)
    }

    /// Insert or overwrite an entry. A nil value removes the key.
    pub fn put(&mut self, key: Value, value: Value) {
        if key.is_nil() {
            return;
        }
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    /// Remove a key, returning its previous value
    pub fn remove(&mut self, key: &Value) -> Value {
        self.entries.remove(key).unwrap_or(Value::Nil)
    }

    /// Number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    pub(crate) fn owned_bytes(&self) -> usize {
        self.entries.capacity() * 2 * mem::size_of::<Value>()
    }
}
