//! Immutable tuple and struct payloads
//!
//! Both are deduplicated by content through the intern cache, so their content
//! never changes after construction.

use crate::value::Value;

/// Fixed-length immutable sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    items: Box<[Value]>,
}

impl Tuple {
    /// Build a tuple from its elements
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: items.into_boxed_slice(),
        }
    }

    /// Elements in order
    #[inline]
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the tuple is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Immutable key/value mapping
///
/// Pairs are kept in a canonical order (sorted by key, later duplicates win,
/// nil keys and values dropped) so equal content always produces equal pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Struct {
    pairs: Box<[(Value, Value)]>,
}

impl Struct {
    /// Build a struct from key/value pairs
    pub fn new(pairs: Vec<(Value, Value)>) -> Self {
        let mut pairs: Vec<(Value, Value)> = pairs
            .into_iter()
            .filter(|(k, v)| !k.is_nil() && !v.is_nil())
            .collect();
        // Stable sort keeps the original order among equal keys, so the last
        // occurrence is the one dedup should keep.
        pairs.sort_by_key(|(k, _)| k.ordering_key());
        let mut canonical: Vec<(Value, Value)> = Vec::with_capacity(pairs.len());
        for pair in pairs {
            match canonical.last_mut() {
                Some(last) if last.0 == pair.0 => *last = pair,
                _ => canonical.push(pair),
            }
        }
        Self {
            pairs: canonical.into_boxed_slice(),
        }
    }

    /// Look up a key; missing keys read as nil
    pub fn get(&self, key: &Value) -> Value {
        self.pairs
            .binary_search_by_key(&key.ordering_key(), |(k, _)| k.ordering_key())
            .map(|i| self.pairs[i].1)
            .unwrap_or(Value::Nil)
    }

    /// Pairs in canonical order
    #[inline]
    pub fn pairs(&self) -> &[(Value, Value)] {
        &self.pairs
    }

    /// Number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if the struct is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_canonical_order() {
        let a = Struct::new(vec![
            (Value::Integer(2), Value::Boolean(true)),
            (Value::Integer(1), Value::Boolean(false)),
        ]);
        let b = Struct::new(vec![
            (Value::Integer(1), Value::Boolean(false)),
            (Value::Integer(2), Value::Boolean(true)),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.get(&Value::Integer(2)), Value::Boolean(true));
        assert_eq!(a.get(&Value::Integer(3)), Value::Nil);
    }

    #[test]
    fn test_struct_last_duplicate_wins() {
        let s = Struct::new(vec![
            (Value::Integer(1), Value::Integer(10)),
            (Value::Integer(1), Value::Integer(20)),
            (Value::Integer(2), Value::Nil),
        ]);
        assert_eq!(s.len(), 1);
        assert_eq!(s.get(&Value::Integer(1)), Value::Integer(20));
    }
}
