//! Garbage collection system
//!
//! This module provides the mark-sweep collector for the Tarn interpreter.
//!
//! # Architecture
//!
//! - **BlockHeader**: Per-block metadata (kind, reachable, pinned, size)
//! - **BlockHeap**: Slot arena holding every live block
//! - **Marker**: Worklist-driven reachability tracing from the active fiber
//! - **Sweep**: Finalization and release of unreachable, unpinned blocks
//! - **CollectionTrigger**: Byte counter deciding when a cycle is due
//! - **GarbageCollector**: The facade the interpreter talks to
//!
//! # Block Layout
//!
//! ```text
//! slot i ┌─────────────────────────────────────┐
//!        │ generation: u32                     │  ← GcRef { index: i, generation }
//!        ├─────────────────────────────────────┤
//!        │ BlockHeader                         │
//!        │  - kind, reachable, pinned, size    │
//!        ├─────────────────────────────────────┤
//!        │ HeapObject (payload)                │
//!        └─────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tarn_gc::{Array, GarbageCollector, Value};
//!
//! let mut gc = GarbageCollector::default();
//!
//! let kept = gc.allocate(Array::new());
//! gc.pin(Value::Array(kept));
//! let _garbage = gc.allocate(Array::new());
//!
//! gc.collect();
//! assert!(gc.is_live(kept));
//! ```

mod collector;
mod header;
mod heap;
mod mark;
mod pin;
mod policy;
mod sweep;

pub use collector::{GarbageCollector, GcStats, HeapStats};
pub use header::{BlockHeader, BlockKind};
pub use heap::{Block, BlockHeap};
