//! Mark-sweep garbage collector

use std::time::{Duration, Instant};

use super::header::BlockKind;
use super::heap::BlockHeap;
use super::mark::Marker;
use super::pin;
use super::policy::CollectionTrigger;
use super::sweep;
use crate::cache::{ContentCache, InternCache, InternKey};
use crate::config::GcConfig;
use crate::object::{
    EnvStorage, Fiber, FuncEnv, HeapData, HeapObject, HeapString, Struct, Tuple,
};
use crate::value::{GcRef, Value};
use crate::{GcError, GcResult};

/// GC statistics
#[derive(Debug, Clone, Default)]
pub struct GcStats {
    /// Total number of collections
    pub collections: usize,

    /// Total blocks freed
    pub objects_freed: usize,

    /// Total bytes freed
    pub bytes_freed: usize,

    /// Total pause time across all collections
    pub total_pause_time: Duration,

    /// Last collection duration
    pub last_pause_time: Duration,

    /// Average pause time
    pub avg_pause_time: Duration,

    /// Maximum pause time
    pub max_pause_time: Duration,

    /// Minimum pause time
    pub min_pause_time: Duration,

    /// Blocks marked in last collection
    pub last_marked_count: usize,

    /// Blocks freed in last collection
    pub last_freed_count: usize,

    /// Bytes freed in last collection
    pub last_freed_bytes: usize,

    /// Live blocks after last collection
    pub live_objects: usize,

    /// Live bytes after last collection
    pub live_bytes: usize,
}

impl GcStats {
    /// Update statistics after a collection
    fn update(
        &mut self,
        pause_time: Duration,
        marked: usize,
        freed: usize,
        freed_bytes: usize,
        live_objects: usize,
        live_bytes: usize,
    ) {
        self.collections += 1;
        self.objects_freed += freed;
        self.bytes_freed += freed_bytes;
        self.total_pause_time += pause_time;
        self.last_pause_time = pause_time;

        let divisor = u32::try_from(self.collections).unwrap_or(u32::MAX);
        self.avg_pause_time = self.total_pause_time / divisor;

        if pause_time > self.max_pause_time {
            self.max_pause_time = pause_time;
        }
        if self.collections == 1 || pause_time < self.min_pause_time {
            self.min_pause_time = pause_time;
        }

        self.last_marked_count = marked;
        self.last_freed_count = freed;
        self.last_freed_bytes = freed_bytes;
        self.live_objects = live_objects;
        self.live_bytes = live_bytes;
    }

    /// Fraction of blocks that survived the last collection (0.0 to 1.0)
    pub fn survival_rate(&self) -> f64 {
        let seen = self.live_objects + self.last_freed_count;
        if seen == 0 {
            return 0.0;
        }
        self.live_objects as f64 / seen as f64
    }
}

/// Heap statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total allocated bytes
    pub allocated_bytes: usize,

    /// Number of live blocks
    pub allocation_count: usize,

    /// Bytes allocated since the last collection
    pub pending_bytes: usize,

    /// Collection interval
    pub interval: usize,
}

/// Mark-sweep garbage collector
///
/// Owns every block the interpreter allocates. Collection is never started
/// implicitly: the interpreter polls [`should_collect`](Self::should_collect)
/// at a safe point and calls [`collect`](Self::collect), with every live
/// value either reachable from the active fiber or pinned.
pub struct GarbageCollector {
    /// Block allocator
    heap: BlockHeap,

    /// Content dedup table for strings, tuples and structs
    cache: Box<dyn InternCache>,

    /// Allocation byte counter
    trigger: CollectionTrigger,

    /// Root of the mark phase
    active_fiber: Option<GcRef>,

    /// Statistics
    stats: GcStats,

    /// Set once `release_all` has torn the heap down
    released: bool,
}

impl GarbageCollector {
    /// Create a collector with the default content cache
    pub fn new(config: GcConfig) -> Self {
        Self::with_cache(config, Box::new(ContentCache::new()))
    }

    /// Create a collector notifying a runtime-provided intern cache
    pub fn with_cache(config: GcConfig, cache: Box<dyn InternCache>) -> Self {
        tracing::debug!(
            interval = config.collection_interval,
            capacity = config.initial_capacity,
            "gc created"
        );
        Self {
            heap: BlockHeap::with_capacity(config.initial_capacity),
            cache,
            trigger: CollectionTrigger::new(config.collection_interval),
            active_fiber: None,
            stats: GcStats::default(),
            released: false,
        }
    }

    /// Allocate a block holding `object`
    ///
    /// # Panics
    ///
    /// Panics if called after [`release_all`](Self::release_all).
    pub fn allocate<T: Into<HeapObject>>(&mut self, object: T) -> GcRef {
        assert!(!self.released, "allocation after heap teardown");

        let block_ref = self.heap.allocate(object.into());
        let size = self
            .heap
            .get(block_ref)
            .map_or(0, |block| block.header().size());
        self.trigger.record_allocation(size);
        block_ref
    }

    /// Return the canonical string block for `bytes`, allocating it if needed
    pub fn intern_string(&mut self, bytes: &[u8]) -> Value {
        Value::String(self.intern(HeapString::new(bytes).into()))
    }

    /// Symbol with the given name. Symbols share string blocks, so a symbol
    /// and a string with the same bytes are backed by one block.
    pub fn intern_symbol(&mut self, name: &[u8]) -> Value {
        Value::Symbol(self.intern(HeapString::new(name).into()))
    }

    /// Return the canonical tuple block with these elements
    pub fn intern_tuple(&mut self, items: Vec<Value>) -> Value {
        Value::Tuple(self.intern(Tuple::new(items).into()))
    }

    /// Return the canonical struct block with these pairs
    pub fn intern_struct(&mut self, pairs: Vec<(Value, Value)>) -> Value {
        Value::Struct(self.intern(Struct::new(pairs).into()))
    }

    fn intern(&mut self, object: HeapObject) -> GcRef {
        let Some(key) = InternKey::of(&object) else {
            return self.allocate(object);
        };
        if let Some(existing) = self.cache.lookup(&key) {
            if self.heap.try_get(existing, object.kind()).is_ok() {
                return existing;
            }
            tracing::warn!(block = ?existing, "intern cache returned a dead block");
        }
        let block_ref = self.allocate(object);
        self.cache.insert(key, block_ref);
        block_ref
    }

    /// Borrow the payload behind `block_ref` if it is live and of type `T`
    pub fn get<T: HeapData>(&self, block_ref: GcRef) -> Option<&T> {
        self.heap
            .get(block_ref)
            .and_then(|block| T::from_object(block.object()))
    }

    /// Mutably borrow the payload behind `block_ref` if it is live and of type `T`
    pub fn get_mut<T: HeapData>(&mut self, block_ref: GcRef) -> Option<&mut T> {
        self.heap
            .get_mut(block_ref)
            .and_then(|block| T::from_object_mut(block.object_mut()))
    }

    /// Borrow the payload behind `block_ref`, reporting why it is unavailable
    pub fn try_get<T: HeapData>(&self, block_ref: GcRef) -> GcResult<&T> {
        let block = self.heap.try_get(block_ref, T::KIND)?;
        T::from_object(block.object()).ok_or(GcError::KindMismatch {
            expected: T::KIND,
            found: block.header().kind(),
        })
    }

    /// Mutably borrow the payload behind `block_ref`, reporting why it is
    /// unavailable
    pub fn try_get_mut<T: HeapData>(&mut self, block_ref: GcRef) -> GcResult<&mut T> {
        let block = self.heap.try_get_mut(block_ref, T::KIND)?;
        let found = block.header().kind();
        T::from_object_mut(block.object_mut()).ok_or(GcError::KindMismatch {
            expected: T::KIND,
            found,
        })
    }

    /// Check if `block_ref` still names a live block
    pub fn is_live(&self, block_ref: GcRef) -> bool {
        self.heap.get(block_ref).is_some()
    }

    /// Kind of the live block behind `block_ref`
    pub fn block_kind(&self, block_ref: GcRef) -> Option<BlockKind> {
        self.heap.get(block_ref).map(|block| block.header().kind())
    }

    /// Set the fiber the mark phase starts from
    pub fn set_active_fiber(&mut self, fiber: Option<GcRef>) {
        self.active_fiber = fiber;
    }

    /// Fiber the mark phase starts from
    pub fn active_fiber(&self) -> Option<GcRef> {
        self.active_fiber
    }

    /// Mark `value` and everything reachable from it as live for the next
    /// sweep. Non-heap values are ignored.
    ///
    /// # Panics
    ///
    /// Panics if a reachable handle is stale or has the wrong kind.
    pub fn mark(&mut self, value: Value) {
        Marker::new(&mut self.heap).mark_value(value);
    }

    /// Keep the block behind `value` alive regardless of reachability.
    /// Pins do not nest. Non-heap values are ignored.
    ///
    /// Only the block itself is kept. Anything it references must be pinned
    /// or reachable on its own, otherwise it is reclaimed and the pinned block
    /// is left holding a stale handle; marking it later panics.
    pub fn pin(&mut self, value: Value) {
        pin::set_pinned(&mut self.heap, value, true);
    }

    /// Clear the pin of the block behind `value`
    pub fn unpin(&mut self, value: Value) {
        pin::set_pinned(&mut self.heap, value, false);
    }

    /// Check if the block behind `value` is pinned
    pub fn is_pinned(&self, value: Value) -> bool {
        pin::is_pinned(&self.heap, value)
    }

    /// Check if enough bytes were allocated since the last collection
    pub fn should_collect(&self) -> bool {
        self.trigger.should_collect()
    }

    /// Bytes allocated since the last collection
    pub fn pending_bytes(&self) -> usize {
        self.trigger.pending_bytes()
    }

    /// Bytes between collections
    pub fn interval(&self) -> usize {
        self.trigger.interval()
    }

    /// Set the collection interval
    pub fn set_interval(&mut self, bytes: usize) {
        self.trigger.set_interval(bytes);
    }

    /// Run garbage collection rooted at the active fiber
    pub fn collect(&mut self) {
        self.collect_with_roots(&[]);
    }

    /// Run garbage collection rooted at the active fiber and `roots`
    pub fn collect_with_roots(&mut self, roots: &[Value]) {
        let start = Instant::now();
        tracing::debug!(
            blocks = self.heap.len(),
            bytes = self.heap.allocated_bytes(),
            pending = self.trigger.pending_bytes(),
            "gc collect start"
        );

        let mut marker = Marker::new(&mut self.heap);
        if let Some(fiber) = self.active_fiber {
            marker.mark_block(fiber, BlockKind::Fiber);
        }
        for &root in roots {
            marker.mark_value(root);
        }
        let marked = marker.marked();

        let outcome = sweep::sweep(&mut self.heap, &mut *self.cache);
        self.trigger.reset();

        let pause = start.elapsed();
        self.stats.update(
            pause,
            marked,
            outcome.freed,
            outcome.freed_bytes,
            self.heap.len(),
            self.heap.allocated_bytes(),
        );

        tracing::debug!(
            marked,
            freed = outcome.freed,
            freed_bytes = outcome.freed_bytes,
            live = self.heap.len(),
            pause_us = pause.as_micros() as u64,
            "gc collect end"
        );
    }

    /// Detach an open environment from its fiber by copying the captured
    /// slots, as done when the frame that owns them returns
    pub fn close_env(&mut self, env: GcRef) -> GcResult<()> {
        let func_env = self.try_get::<FuncEnv>(env)?;
        let (fiber, offset) = match func_env.storage() {
            EnvStorage::Open { fiber, offset } => (*fiber, *offset),
            EnvStorage::Closed(_) => return Err(GcError::EnvClosed(env)),
        };
        let length = func_env.len();

        let values = self.try_get::<Fiber>(fiber)?.captured(offset, length)?;
        self.try_get_mut::<FuncEnv>(env)?.detach(values);
        Ok(())
    }

    /// Free every block unconditionally, running finalizers and notifying
    /// the intern cache. The collector cannot allocate afterwards.
    pub fn release_all(&mut self) {
        if self.released {
            return;
        }
        let outcome = sweep::release_all(&mut self.heap, &mut *self.cache);
        self.active_fiber = None;
        self.released = true;
        tracing::debug!(
            freed = outcome.freed,
            freed_bytes = outcome.freed_bytes,
            "gc heap released"
        );
    }

    /// Get GC statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Get heap statistics
    pub fn heap_stats(&self) -> HeapStats {
        HeapStats {
            allocated_bytes: self.heap.allocated_bytes(),
            allocation_count: self.heap.len(),
            pending_bytes: self.trigger.pending_bytes(),
            interval: self.trigger.interval(),
        }
    }

    /// Number of live blocks
    pub fn block_count(&self) -> usize {
        self.heap.len()
    }

    /// Bytes accounted to live blocks
    pub fn allocated_bytes(&self) -> usize {
        self.heap.allocated_bytes()
    }

    /// Intern cache the collector notifies
    pub fn cache(&self) -> &dyn InternCache {
        &*self.cache
    }

    /// Get read-only access to the heap for debugging
    pub fn heap(&self) -> &BlockHeap {
        &self.heap
    }
}

impl Default for GarbageCollector {
    fn default() -> Self {
        Self::new(GcConfig::default())
    }
}

impl Drop for GarbageCollector {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(blocks = self.heap.len(), "collector dropped without release_all");
            self.release_all();
        }
    }
}
