//! Heap object model
//!
//! Every block on the managed heap holds exactly one [`HeapObject`]. The
//! payload types are plain Rust structs that own their backing storage; the
//! collector releases that storage by dropping the object during sweep.
//!
//! Values are stored as handles ([`crate::GcRef`]), never as borrows, so
//! cycles (a table containing itself, a closure capturing its own fiber) are
//! representable without reference counting.

mod array;
mod buffer;
mod fiber;
mod function;
mod string;
mod table;
mod tuple;
mod userdata;

pub use array::Array;
pub use buffer::Buffer;
pub use fiber::{Fiber, FrameView, Frames, StackFrame, StackSlot, FRAME_SIZE};
pub use function::{Constant, EnvStorage, FuncDef, FuncEnv, Function};
pub use string::HeapString;
pub use table::Table;
pub use tuple::{Struct, Tuple};
pub use userdata::{Userdata, UserdataType};

use std::mem;

use crate::gc::BlockKind;

/// The payload of one heap block
#[derive(Debug)]
pub enum HeapObject {
    /// String or symbol bytes
    String(HeapString),
    /// Mutable array
    Array(Array),
    /// Mutable hash table
    Table(Table),
    /// Immutable struct
    Struct(Struct),
    /// Immutable tuple
    Tuple(Tuple),
    /// Byte buffer
    Buffer(Buffer),
    /// Closure
    Function(Function),
    /// Closure environment
    FuncEnv(FuncEnv),
    /// Function template
    FuncDef(FuncDef),
    /// Execution context
    Fiber(Fiber),
    /// Host payload
    Userdata(Userdata),
}

impl HeapObject {
    /// Kind recorded in the block header for this payload
    pub fn kind(&self) -> BlockKind {
        match self {
            HeapObject::String(_) => BlockKind::String,
            HeapObject::Array(_) => BlockKind::Array,
            HeapObject::Table(_) => BlockKind::Table,
            HeapObject::Struct(_) => BlockKind::Struct,
            HeapObject::Tuple(_) => BlockKind::Tuple,
            HeapObject::Buffer(_) => BlockKind::Buffer,
            HeapObject::Function(_) => BlockKind::Function,
            HeapObject::FuncEnv(_) => BlockKind::FuncEnv,
            HeapObject::FuncDef(_) => BlockKind::FuncDef,
            HeapObject::Fiber(_) => BlockKind::Fiber,
            HeapObject::Userdata(_) => BlockKind::Userdata,
        }
    }

    /// Bytes accounted to the block: the inline object plus its owned buffers
    pub fn footprint(&self) -> usize {
        let owned = match self {
            HeapObject::String(s) => s.len(),
            HeapObject::Array(a) => a.capacity() * mem::size_of::<crate::Value>(),
            HeapObject::Table(t) => t.owned_bytes(),
            HeapObject::Struct(s) => s.len() * 2 * mem::size_of::<crate::Value>(),
            HeapObject::Tuple(t) => t.len() * mem::size_of::<crate::Value>(),
            HeapObject::Buffer(b) => b.capacity(),
            HeapObject::Function(f) => f.envs().len() * mem::size_of::<Option<crate::GcRef>>(),
            HeapObject::FuncEnv(e) => e.owned_bytes(),
            HeapObject::FuncDef(d) => d.owned_bytes(),
            HeapObject::Fiber(f) => f.capacity() * mem::size_of::<StackSlot>(),
            HeapObject::Userdata(u) => u.size(),
        };
        mem::size_of::<HeapObject>() + owned
    }
}

/// Payload types that can be stored in a block and borrowed back out of one
pub trait HeapData: Into<HeapObject> {
    /// Kind of block holding this payload
    const KIND: BlockKind;

    /// Borrow the payload if `object` holds this type
    fn from_object(object: &HeapObject) -> Option<&Self>;

    /// Mutably borrow the payload if `object` holds this type
    fn from_object_mut(object: &mut HeapObject) -> Option<&mut Self>;
}

macro_rules! heap_data {
    ($ty:ident, $kind:ident) => {
        impl From<$ty> for HeapObject {
            fn from(data: $ty) -> Self {
                HeapObject::$kind(data)
            }
        }

        impl HeapData for $ty {
            const KIND: BlockKind = BlockKind::$kind;

            fn from_object(object: &HeapObject) -> Option<&Self> {
                match object {
                    HeapObject::$kind(data) => Some(data),
                    _ => None,
                }
            }

            fn from_object_mut(object: &mut HeapObject) -> Option<&mut Self> {
                match object {
                    HeapObject::$kind(data) => Some(data),
                    _ => None,
                }
            }
        }
    };
}

heap_data!(HeapString, String);
heap_data!(Array, Array);
heap_data!(Table, Table);
heap_data!(Struct, Struct);
heap_data!(Tuple, Tuple);
heap_data!(Buffer, Buffer);
heap_data!(Function, Function);
heap_data!(FuncEnv, FuncEnv);
heap_data!(FuncDef, FuncDef);
heap_data!(Fiber, Fiber);
heap_data!(Userdata, Userdata);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_kind_matches_variant() {
        let object: HeapObject = Array::from(vec![Value::Integer(1)]).into();
        assert_eq!(object.kind(), BlockKind::Array);
        assert_eq!(object.kind(), Array::KIND);

        let object: HeapObject = Buffer::new().into();
        assert_eq!(object.kind(), BlockKind::Buffer);
    }

    #[test]
    fn test_footprint_counts_owned_storage() {
        let small: HeapObject = Array::new().into();
        let large: HeapObject = Array::with_capacity(64).into();
        assert!(large.footprint() > small.footprint());
        assert!(small.footprint() >= mem::size_of::<HeapObject>());
    }

    #[test]
    fn test_heap_data_downcast() {
        let mut object: HeapObject = Table::new().into();
        assert!(Table::from_object(&object).is_some());
        assert!(Array::from_object(&object).is_none());

        let table = Table::from_object_mut(&mut object).unwrap();
        table.put(Value::Integer(1), Value::Boolean(true));
        assert_eq!(Table::from_object(&object).unwrap().len(), 1);
    }
}
