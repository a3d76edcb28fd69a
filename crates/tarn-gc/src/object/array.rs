//! Array payload

use crate::value::Value;
use crate::{GcError, GcResult};

/// Growable array of values
#[derive(Debug, Clone, Default)]
pub struct Array {
    items: Vec<Value>,
}

impl Array {
    /// Create an empty array
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty array with room for `capacity` values
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the array is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Allocated element capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Get an element, or `None` past the end
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.get(index).copied()
    }

    /// Overwrite an element
    pub fn set(&mut self, index: usize, value: Value) -> GcResult<()> {
        let len = self.items.len();
        match self.items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(GcError::IndexOutOfBounds { index, len }),
        }
    }

    /// Append an element
    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    /// Remove and return the last element
    pub fn pop(&mut self) -> Option<Value> {
        self.items.pop()
    }

    /// All elements
    #[inline]
    pub fn items(&self) -> &[Value] {
        &self.items
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Self { items }
    }
}
