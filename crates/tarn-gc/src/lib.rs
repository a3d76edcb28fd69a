//! Tarn heap manager and garbage collector
//!
//! This crate owns every heap-allocated object the Tarn interpreter produces:
//! - Block allocation with per-block headers
//! - Mark-sweep collection rooted at the active fiber
//! - Pinning for values only held by native code
//! - Finalization, including intern cache notification and userdata finalizers
//! - A byte-counter collection trigger
//!
//! The interpreter, compiler, scheduler and the intern cache's equality rules
//! live elsewhere; they reach this crate through [`GarbageCollector`] and the
//! [`InternCache`] trait.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cache;
pub mod config;
pub mod defaults;
pub mod gc;
pub mod object;
pub mod value;

pub use cache::{ContentCache, InternCache, InternKey};
pub use config::GcConfig;
pub use gc::{BlockHeader, BlockKind, GarbageCollector, GcStats, HeapStats};
pub use object::{
    Array, Buffer, Constant, EnvStorage, Fiber, FrameView, FuncDef, FuncEnv, Function,
    HeapData, HeapObject, HeapString, StackFrame, StackSlot, Struct, Table, Tuple, Userdata,
    UserdataType, FRAME_SIZE,
};
pub use value::{GcRef, Value};

/// Errors reported by the fallible heap accessors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GcError {
    /// The block behind this handle has been reclaimed
    #[error("Stale heap reference: {0:?}")]
    StaleRef(GcRef),

    /// The block exists but holds a different variant
    #[error("Kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// Kind the caller asked for
        expected: BlockKind,
        /// Kind the block actually has
        found: BlockKind,
    },

    /// Index past the end of an array
    #[error("Index {index} out of bounds (length {len})")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Current length
        len: usize,
    },

    /// Closing an environment that no longer refers to a fiber
    #[error("Closure environment {0:?} is already closed")]
    EnvClosed(GcRef),

    /// An open environment points past the top of its fiber's stack
    #[error("Environment slots {offset}..{end} exceed fiber stack of {len} slots")]
    EnvOutOfBounds {
        /// First captured slot
        offset: usize,
        /// One past the last captured slot
        end: usize,
        /// Current fiber stack height
        len: usize,
    },

    /// Popping a frame from a fiber with no frames
    #[error("Fiber has no frame to pop")]
    NoFrame,
}

/// Result type for heap accessors
pub type GcResult<T> = Result<T, GcError>;
