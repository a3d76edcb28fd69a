//! Sweep phase and finalization
//!
//! Sweep walks the arena by slot index. Kept blocks have their reachable bit
//! cleared for the next cycle; every other block is taken out of its slot,
//! finalized and then dropped, which releases its owned storage. The header of
//! a released block is never read again.

use super::heap::{Block, BlockHeap};
use crate::cache::{InternCache, InternKey};
use crate::object::HeapObject;
use crate::value::GcRef;

/// Blocks and bytes released by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SweepOutcome {
    pub freed: usize,
    pub freed_bytes: usize,
}

/// Release every block that is neither reachable nor pinned
pub(crate) fn sweep(heap: &mut BlockHeap, cache: &mut dyn InternCache) -> SweepOutcome {
    let mut outcome = SweepOutcome::default();

    for index in 0..heap.slot_count() {
        let Some(block) = heap.block_at_mut(index) else {
            continue;
        };
        let header = block.header_mut();
        if header.survives_sweep() {
            // Pin bit is left as is; only the mark is per-cycle.
            header.unmark();
            continue;
        }
        release(heap, index, cache, &mut outcome);
    }

    outcome
}

/// Release every block unconditionally, as at interpreter shutdown
pub(crate) fn release_all(heap: &mut BlockHeap, cache: &mut dyn InternCache) -> SweepOutcome {
    let mut outcome = SweepOutcome::default();
    for index in 0..heap.slot_count() {
        release(heap, index, cache, &mut outcome);
    }
    outcome
}

fn release(
    heap: &mut BlockHeap,
    index: usize,
    cache: &mut dyn InternCache,
    outcome: &mut SweepOutcome,
) {
    if let Some((block_ref, mut block)) = heap.free(index) {
        outcome.freed += 1;
        outcome.freed_bytes += block.header().size();
        finalize(block_ref, &mut block, cache);
    }
}

/// Run kind-specific cleanup while the block's content is still intact
fn finalize(block_ref: GcRef, block: &mut Block, cache: &mut dyn InternCache) {
    let (header, object) = block.parts_mut();
    tracing::trace!(block = ?block_ref, kind = %header.kind(), size = header.size(), "finalizing block");

    match object {
        HeapObject::String(_) | HeapObject::Tuple(_) | HeapObject::Struct(_) => {
            if let Some(key) = InternKey::of(object) {
                cache.remove(&key, block_ref);
            }
        }
        HeapObject::Userdata(userdata) => userdata.finalize(),
        HeapObject::Array(_)
        | HeapObject::Table(_)
        | HeapObject::Buffer(_)
        | HeapObject::Function(_)
        | HeapObject::FuncEnv(_)
        | HeapObject::FuncDef(_)
        | HeapObject::Fiber(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ContentCache;
    use crate::gc::BlockKind;
    use crate::object::{Array, HeapString, Table, Tuple, Userdata, UserdataType};
    use crate::value::Value;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_sweep_frees_unmarked() {
        let mut heap = BlockHeap::default();
        let mut cache = ContentCache::new();
        let kept = heap.allocate(Array::new().into());
        let dropped = heap.allocate(Table::new().into());
        let dropped_size = heap.get(dropped).unwrap().header().size();
        heap.get_mut(kept).unwrap().header_mut().mark();

        let outcome = sweep(&mut heap, &mut cache);
        assert_eq!(outcome.freed, 1);
        assert_eq!(outcome.freed_bytes, dropped_size);

        assert!(heap.get(dropped).is_none());
        let header = heap.get(kept).unwrap().header();
        assert!(!header.is_reachable(), "kept blocks are unmarked for the next cycle");
    }

    #[test]
    fn test_sweep_keeps_pinned_and_preserves_pin() {
        let mut heap = BlockHeap::default();
        let mut cache = ContentCache::new();
        let pinned = heap.allocate(Array::new().into());
        heap.get_mut(pinned).unwrap().header_mut().set_pinned(true);

        assert_eq!(sweep(&mut heap, &mut cache).freed, 0);
        assert_eq!(sweep(&mut heap, &mut cache).freed, 0);
        assert!(heap.get(pinned).unwrap().header().is_pinned());
    }

    #[test]
    fn test_sweep_removes_interned_from_cache() {
        let mut heap = BlockHeap::default();
        let mut cache = ContentCache::new();

        let s = heap.allocate(HeapString::from("gone").into());
        cache.insert(InternKey::String(b"gone"[..].into()), s);
        let t = heap.allocate(Tuple::new(vec![Value::Integer(1)]).into());
        cache.insert(InternKey::Tuple(vec![Value::Integer(1)].into_boxed_slice()), t);

        sweep(&mut heap, &mut cache);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_userdata_finalized_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let ty = Rc::new(UserdataType::with_finalizer("file", move |_| {
            counter.set(counter.get() + 1);
        }));

        let mut heap = BlockHeap::default();
        let mut cache = ContentCache::new();
        heap.allocate(Userdata::new(ty, 8).into());

        sweep(&mut heap, &mut cache);
        sweep(&mut heap, &mut cache);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_release_all_ignores_marks_and_pins() {
        let mut heap = BlockHeap::default();
        let mut cache = ContentCache::new();
        let a = heap.allocate(Array::new().into());
        let b = heap.allocate(Array::new().into());
        heap.get_mut(a).unwrap().header_mut().mark();
        heap.get_mut(b).unwrap().header_mut().set_pinned(true);

        let outcome = release_all(&mut heap, &mut cache);
        assert_eq!(outcome.freed, 2);
        assert!(heap.is_empty());
        assert_eq!(heap.allocated_bytes(), 0);
        assert!(heap.try_get(a, BlockKind::Array).is_err());
    }
}
