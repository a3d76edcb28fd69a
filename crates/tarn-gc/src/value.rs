//! Value representation
//!
//! A [`Value`] is either an immediate (nil, booleans, integers, reals) that the
//! collector never looks at, or a handle to a block on the managed heap.
//!
//! Heap handles are [`GcRef`]s: a slot index plus the generation of that slot at
//! allocation time. Once a block is swept its slot generation moves on, so a
//! handle kept past the block's lifetime is detected as stale instead of
//! silently aliasing whatever reuses the slot.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::gc::BlockKind;

/// Handle to a heap block. `Copy`, 8 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcRef {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl GcRef {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index of the block
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when this handle was issued
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for GcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GcRef({}/{})", self.index, self.generation)
    }
}

/// Tagged runtime value
#[derive(Clone, Copy, Debug, Default)]
pub enum Value {
    /// The nil immediate
    #[default]
    Nil,
    /// Boolean immediate
    Boolean(bool),
    /// Integer immediate
    Integer(i32),
    /// Real immediate
    Real(f64),
    /// Immutable interned string
    String(GcRef),
    /// Symbol; shares the string block of the same content
    Symbol(GcRef),
    /// Mutable array
    Array(GcRef),
    /// Mutable hash table
    Table(GcRef),
    /// Immutable interned struct
    Struct(GcRef),
    /// Immutable interned tuple
    Tuple(GcRef),
    /// Mutable byte buffer
    Buffer(GcRef),
    /// Closure
    Function(GcRef),
    /// Execution context
    Fiber(GcRef),
    /// Host-defined payload
    Userdata(GcRef),
}

impl Value {
    /// Map a value to the block it references and the kind that block must have.
    ///
    /// This is the one switch every per-variant routine (mark, pin, unpin) goes
    /// through; a new heap variant only has to be added here.
    #[inline]
    pub fn heap_ref(&self) -> Option<(GcRef, BlockKind)> {
        match *self {
            Value::Nil | Value::Boolean(_) | Value::Integer(_) | Value::Real(_) => None,
            Value::String(r) | Value::Symbol(r) => Some((r, BlockKind::String)),
            Value::Array(r) => Some((r, BlockKind::Array)),
            Value::Table(r) => Some((r, BlockKind::Table)),
            Value::Struct(r) => Some((r, BlockKind::Struct)),
            Value::Tuple(r) => Some((r, BlockKind::Tuple)),
            Value::Buffer(r) => Some((r, BlockKind::Buffer)),
            Value::Function(r) => Some((r, BlockKind::Function)),
            Value::Fiber(r) => Some((r, BlockKind::Fiber)),
            Value::Userdata(r) => Some((r, BlockKind::Userdata)),
        }
    }

    /// Check if this value references the heap
    #[inline]
    pub fn is_heap_allocated(&self) -> bool {
        self.heap_ref().is_some()
    }

    /// Check if this value is nil
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Name of the value's type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Array(_) => "array",
            Value::Table(_) => "table",
            Value::Struct(_) => "struct",
            Value::Tuple(_) => "tuple",
            Value::Buffer(_) => "buffer",
            Value::Function(_) => "function",
            Value::Fiber(_) => "fiber",
            Value::Userdata(_) => "userdata",
        }
    }

    /// Total order used to canonicalize struct keys: tag first, then payload bits
    pub(crate) fn ordering_key(&self) -> (u8, u64) {
        let bits = match *self {
            Value::Nil => 0,
            Value::Boolean(b) => b as u64,
            Value::Integer(i) => i as u32 as u64,
            Value::Real(r) => r.to_bits(),
            _ => match self.heap_ref() {
                Some((r, _)) => ((r.index as u64) << 32) | r.generation as u64,
                None => 0,
            },
        };
        (self.discriminant(), bits)
    }

    fn discriminant(&self) -> u8 {
        match self {
            Value::Nil => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) => 2,
            Value::Real(_) => 3,
            Value::String(_) => 4,
            Value::Symbol(_) => 5,
            Value::Array(_) => 6,
            Value::Table(_) => 7,
            Value::Struct(_) => 8,
            Value::Tuple(_) => 9,
            Value::Buffer(_) => 10,
            Value::Function(_) => 11,
            Value::Fiber(_) => 12,
            Value::Userdata(_) => 13,
        }
    }
}

// Reals compare by bit pattern so values can key tables and the intern cache.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            _ => match (self.heap_ref(), other.heap_ref()) {
                (Some((a, _)), Some((b, _))) => {
                    a == b && self.discriminant() == other.discriminant()
                }
                _ => false,
            },
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.discriminant().hash(state);
        match self {
            Value::Nil => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Real(r) => r.to_bits().hash(state),
            _ => {
                if let Some((r, _)) = self.heap_ref() {
                    r.hash(state);
                }
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_immediates_have_no_heap_ref() {
        assert!(Value::Nil.heap_ref().is_none());
        assert!(Value::Boolean(true).heap_ref().is_none());
        assert!(Value::Integer(7).heap_ref().is_none());
        assert!(Value::Real(1.5).heap_ref().is_none());
    }

    #[test]
    fn test_string_and_symbol_share_block_kind() {
        let r = GcRef::new(3, 1);
        assert_eq!(Value::String(r).heap_ref(), Some((r, BlockKind::String)));
        assert_eq!(Value::Symbol(r).heap_ref(), Some((r, BlockKind::String)));
        assert_ne!(Value::String(r), Value::Symbol(r));
    }

    #[test]
    fn test_real_equality_by_bits() {
        assert_eq!(Value::Real(f64::NAN), Value::Real(f64::NAN));
        assert_ne!(Value::Real(0.0), Value::Real(-0.0));
        assert_ne!(Value::Integer(1), Value::Real(1.0));
    }

    #[test]
    fn test_values_hash_consistently() {
        let r = GcRef::new(0, 0);
        let mut set = FxHashSet::default();
        set.insert(Value::Array(r));
        set.insert(Value::Array(r));
        set.insert(Value::Table(r));
        set.insert(Value::Integer(4));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_gcref_debug() {
        assert_eq!(format!("{:?}", GcRef::new(12, 4)), "GcRef(12/4)");
    }
}
