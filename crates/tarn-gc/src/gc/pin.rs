//! Pinning
//!
//! A pinned block survives every sweep whether or not the mark phase reached
//! it. Pins are sticky and do not nest: one unpin clears any number of pins.
//! Pinning keeps only the block itself; its children are kept only if they are
//! reachable or pinned on their own.

use super::heap::BlockHeap;
use crate::value::Value;

/// Set or clear the pin bit of the block behind `value`.
/// Non-heap values are ignored.
///
/// # Panics
///
/// Panics if the handle is stale.
pub(crate) fn set_pinned(heap: &mut BlockHeap, value: Value, pinned: bool) {
    if let Some((block_ref, kind)) = value.heap_ref() {
        heap.checked_mut(block_ref, kind)
            .header_mut()
            .set_pinned(pinned);
        tracing::trace!(block = ?block_ref, %kind, pinned, "pin bit updated");
    }
}

/// Check the pin bit of the block behind `value`; false for non-heap values
/// and stale handles
pub(crate) fn is_pinned(heap: &BlockHeap, value: Value) -> bool {
    value
        .heap_ref()
        .and_then(|(block_ref, kind)| heap.try_get(block_ref, kind).ok())
        .map_or(false, |block| block.header().is_pinned())
}
