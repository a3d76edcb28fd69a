//! Block allocator for GC-managed objects
//!
//! Blocks live in an index-addressed slot arena. A freed slot goes on a free
//! list and its generation is bumped, so handles to the old block become stale
//! and sweep can release blocks while walking the arena by index without any
//! list relinking.

use super::header::{BlockHeader, BlockKind};
use crate::object::HeapObject;
use crate::value::GcRef;
use crate::{GcError, GcResult};

/// One allocated block: header plus payload
#[derive(Debug)]
pub struct Block {
    header: BlockHeader,
    object: HeapObject,
}

impl Block {
    /// Block metadata
    #[inline]
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Mutable block metadata
    #[inline]
    pub fn header_mut(&mut self) -> &mut BlockHeader {
        &mut self.header
    }

    /// Payload
    #[inline]
    pub fn object(&self) -> &HeapObject {
        &self.object
    }

    /// Mutable payload
    #[inline]
    pub fn object_mut(&mut self) -> &mut HeapObject {
        &mut self.object
    }

    /// Split into header and payload borrows
    #[inline]
    pub(crate) fn parts_mut(&mut self) -> (&mut BlockHeader, &mut HeapObject) {
        (&mut self.header, &mut self.object)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    block: Option<Block>,
}

/// Arena of every block allocated and not yet swept
#[derive(Debug, Default)]
pub struct BlockHeap {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live_blocks: usize,
    allocated_bytes: usize,
}

impl BlockHeap {
    /// Create a heap with `capacity` block slots reserved
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Place an object in a new block
    ///
    /// Aborts the process if the arena cannot grow.
    pub fn allocate(&mut self, object: HeapObject) -> GcRef {
        let size = object.footprint();
        let block = Block {
            header: BlockHeader::new(object.kind(), size),
            object,
        };

        let block_ref = match self.free_list.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.block = Some(block);
                GcRef::new(index, slot.generation)
            }
            None => {
                if self.slots.try_reserve(1).is_err() {
                    out_of_memory(size);
                }
                let index = match u32::try_from(self.slots.len()) {
                    Ok(index) => index,
                    Err(_) => out_of_memory(size),
                };
                self.slots.push(Slot {
                    generation: 0,
                    block: Some(block),
                });
                GcRef::new(index, 0)
            }
        };

        self.live_blocks += 1;
        self.allocated_bytes += size;
        block_ref
    }

    /// Block behind a handle, or `None` if the handle is stale
    pub fn get(&self, block_ref: GcRef) -> Option<&Block> {
        let slot = self.slots.get(block_ref.index())?;
        if slot.generation != block_ref.generation {
            return None;
        }
        slot.block.as_ref()
    }

    /// Mutable block behind a handle, or `None` if the handle is stale
    pub fn get_mut(&mut self, block_ref: GcRef) -> Option<&mut Block> {
        let slot = self.slots.get_mut(block_ref.index())?;
        if slot.generation != block_ref.generation {
            return None;
        }
        slot.block.as_mut()
    }

    /// Block behind a handle, checked against the kind the caller expects
    pub fn try_get(&self, block_ref: GcRef, kind: BlockKind) -> GcResult<&Block> {
        let block = self.get(block_ref).ok_or(GcError::StaleRef(block_ref))?;
        check_kind(block, kind)?;
        Ok(block)
    }

    /// Mutable block behind a handle, checked against the expected kind
    pub fn try_get_mut(&mut self, block_ref: GcRef, kind: BlockKind) -> GcResult<&mut Block> {
        let block = self.get_mut(block_ref).ok_or(GcError::StaleRef(block_ref))?;
        check_kind(block, kind)?;
        Ok(block)
    }

    /// Like [`try_get_mut`](Self::try_get_mut) for collector-internal paths,
    /// where a stale handle or a kind mismatch means the runtime broke an
    /// invariant.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the block has another kind.
    pub(crate) fn checked_mut(&mut self, block_ref: GcRef, kind: BlockKind) -> &mut Block {
        match self.try_get_mut(block_ref, kind) {
            Ok(block) => block,
            Err(err) => panic!("heap invariant violated at {:?}: {}", block_ref, err),
        }
    }

    /// Take a block out of its slot, making every handle to it stale
    pub(crate) fn free(&mut self, index: usize) -> Option<(GcRef, Block)> {
        let slot = self.slots.get_mut(index)?;
        let block = slot.block.take()?;
        let old_ref = GcRef::new(index as u32, slot.generation);
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index as u32);

        self.live_blocks -= 1;
        self.allocated_bytes = self.allocated_bytes.saturating_sub(block.header.size());
        Some((old_ref, block))
    }

    /// Live block in slot `index`
    pub(crate) fn block_at_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.slots.get_mut(index)?.block.as_mut()
    }

    /// Number of slots ever created (live or free)
    #[inline]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Get number of live blocks
    #[inline]
    pub fn len(&self) -> usize {
        self.live_blocks
    }

    /// Check if no blocks are live
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live_blocks == 0
    }

    /// Get total bytes accounted to live blocks
    #[inline]
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    /// Iterate over handles of all live blocks
    pub fn refs(&self) -> impl Iterator<Item = GcRef> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.block
                .as_ref()
                .map(|_| GcRef::new(index as u32, slot.generation))
        })
    }
}

fn check_kind(block: &Block, expected: BlockKind) -> GcResult<()> {
    let found = block.header.kind();
    if found == expected {
        Ok(())
    } else {
        Err(GcError::KindMismatch { expected, found })
    }
}

#[cold]
fn out_of_memory(size: usize) -> ! {
    tracing::error!(size, "out of memory allocating heap block");
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Array, Buffer, Table};
    use crate::value::Value;

    #[test]
    fn test_heap_creation() {
        let heap = BlockHeap::with_capacity(16);
        assert_eq!(heap.allocated_bytes(), 0);
        assert_eq!(heap.len(), 0);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_heap_allocate() {
        let mut heap = BlockHeap::default();
        let r = heap.allocate(Array::from(vec![Value::Integer(1)]).into());

        let block = heap.get(r).unwrap();
        assert_eq!(block.header().kind(), BlockKind::Array);
        assert!(!block.header().is_reachable());
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.allocated_bytes(), block.header().size());
    }

    #[test]
    fn test_free_makes_ref_stale() {
        let mut heap = BlockHeap::default();
        let r = heap.allocate(Buffer::new().into());

        let (freed, _) = heap.free(r.index()).unwrap();
        assert_eq!(freed, r);
        assert!(heap.get(r).is_none());
        assert_eq!(heap.try_get(r, BlockKind::Buffer).unwrap_err(), GcError::StaleRef(r));
        assert_eq!(heap.len(), 0);
        assert_eq!(heap.allocated_bytes(), 0);
    }

    #[test]
    fn test_free_list_reuse() {
        let mut heap = BlockHeap::default();
        let first = heap.allocate(Table::new().into());
        heap.free(first.index());

        let second = heap.allocate(Table::new().into());
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert!(heap.get(first).is_none());
        assert!(heap.get(second).is_some());
    }

    #[test]
    fn test_kind_mismatch() {
        let mut heap = BlockHeap::default();
        let r = heap.allocate(Table::new().into());
        assert_eq!(
            heap.try_get(r, BlockKind::Array).unwrap_err(),
            GcError::KindMismatch {
                expected: BlockKind::Array,
                found: BlockKind::Table
            }
        );
    }

    #[test]
    #[should_panic(expected = "heap invariant violated")]
    fn test_checked_mut_panics_on_stale() {
        let mut heap = BlockHeap::default();
        let r = heap.allocate(Table::new().into());
        heap.free(r.index());
        heap.checked_mut(r, BlockKind::Table);
    }

    #[test]
    fn test_refs_skip_free_slots() {
        let mut heap = BlockHeap::default();
        let a = heap.allocate(Array::new().into());
        let b = heap.allocate(Array::new().into());
        let c = heap.allocate(Array::new().into());
        heap.free(b.index());

        let refs: Vec<_> = heap.refs().collect();
        assert_eq!(refs, vec![a, c]);
    }
}
