//! Intern cache seam
//!
//! Strings, tuples and structs are deduplicated by content. The cache that does
//! this belongs to the runtime; the collector only needs to look entries up when
//! interning and to drop an entry when the block it names is reclaimed, so that
//! the cache never hands out a handle to freed memory.

use rustc_hash::FxHashMap;

use crate::object::HeapObject;
use crate::value::{GcRef, Value};

/// Content key of an interned block
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InternKey {
    /// String or symbol bytes
    String(Box<[u8]>),
    /// Tuple elements
    Tuple(Box<[Value]>),
    /// Struct pairs in canonical order
    Struct(Box<[(Value, Value)]>),
}

impl InternKey {
    /// Key for the content of `object`, or `None` for kinds that are not interned
    pub fn of(object: &HeapObject) -> Option<InternKey> {
        match object {
            HeapObject::String(s) => Some(InternKey::String(s.as_bytes().into())),
            HeapObject::Tuple(t) => Some(InternKey::Tuple(t.items().into())),
            HeapObject::Struct(s) => Some(InternKey::Struct(s.pairs().into())),
            _ => None,
        }
    }
}

/// Content-addressed dedup table consulted by the collector
pub trait InternCache {
    /// Block currently registered for `key`
    fn lookup(&self, key: &InternKey) -> Option<GcRef>;

    /// Register `block` as the canonical block for `key`
    fn insert(&mut self, key: InternKey, block: GcRef);

    /// Called exactly once for every reclaimed string, tuple or struct block,
    /// while its content is still valid. Returns true if an entry was dropped.
    fn remove(&mut self, key: &InternKey, block: GcRef) -> bool;

    /// Number of live entries
    fn len(&self) -> usize;

    /// Check if the cache has no entries
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default hash-map backed cache
#[derive(Debug, Default)]
pub struct ContentCache {
    entries: FxHashMap<InternKey, GcRef>,
}

impl ContentCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }
}

impl InternCache for ContentCache {
    fn lookup(&self, key: &InternKey) -> Option<GcRef> {
        self.entries.get(key).copied()
    }

    fn insert(&mut self, key: InternKey, block: GcRef) {
        self.entries.insert(key, block);
    }

    fn remove(&mut self, key: &InternKey, block: GcRef) -> bool {
        // A non-interned duplicate of the same content must not evict the
        // canonical entry.
        match self.entries.get(key) {
            Some(&canonical) if canonical == block => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Array, HeapString, Tuple};

    #[test]
    fn test_key_of_interned_kinds() {
        let s: HeapObject = HeapString::from("abc").into();
        assert_eq!(InternKey::of(&s), Some(InternKey::String(b"abc"[..].into())));

        let t: HeapObject = Tuple::new(vec![Value::Integer(1)]).into();
        assert_eq!(
            InternKey::of(&t),
            Some(InternKey::Tuple(vec![Value::Integer(1)].into_boxed_slice()))
        );

        let a: HeapObject = Array::new().into();
        assert_eq!(InternKey::of(&a), None);
    }

    #[test]
    fn test_remove_only_canonical_block() {
        let mut cache = ContentCache::new();
        let key = InternKey::String(b"x"[..].into());
        let canonical = GcRef::new(0, 0);
        let duplicate = GcRef::new(1, 0);

        cache.insert(key.clone(), canonical);
        assert!(!cache.remove(&key, duplicate));
        assert_eq!(cache.lookup(&key), Some(canonical));

        assert!(cache.remove(&key, canonical));
        assert!(cache.is_empty());
    }
}
