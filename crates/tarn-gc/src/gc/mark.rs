//! Mark phase
//!
//! Reachability is traced with an explicit gray worklist instead of recursion,
//! so deeply nested data (long linked tables, deep fiber chains) cannot
//! overflow the native stack. A block's reachable bit is set when it is first
//! pushed; a block that is already marked is never pushed again, which makes
//! cycles terminate.

use super::header::BlockKind;
use super::heap::BlockHeap;
use crate::object::{Constant, EnvStorage, HeapObject};
use crate::value::{GcRef, Value};

/// Gray set entry: a handle plus the kind the referrer expects it to have
type GrayEntry = (GcRef, BlockKind);

/// Marks every block reachable from the roots pushed into it
pub(crate) struct Marker<'h> {
    heap: &'h mut BlockHeap,
    gray: Vec<GrayEntry>,
    marked: usize,
}

impl<'h> Marker<'h> {
    pub fn new(heap: &'h mut BlockHeap) -> Self {
        Self {
            heap,
            gray: Vec::new(),
            marked: 0,
        }
    }

    /// Mark `value` and everything reachable from it
    pub fn mark_value(&mut self, value: Value) {
        if let Some((block_ref, kind)) = value.heap_ref() {
            self.mark_block(block_ref, kind);
        }
    }

    /// Mark the block behind `block_ref`, expected to be of `kind`, and
    /// everything reachable from it
    pub fn mark_block(&mut self, block_ref: GcRef, kind: BlockKind) {
        self.shade(block_ref, kind);
        self.drain();
    }

    /// Number of blocks newly marked by this marker
    pub fn marked(&self) -> usize {
        self.marked
    }

    /// Set the reachable bit and queue the block for tracing, unless it was
    /// already marked.
    ///
    /// # Panics
    ///
    /// Panics on a stale handle or a kind mismatch: a live object referring to
    /// a freed or mistyped block is a runtime invariant violation.
    fn shade(&mut self, block_ref: GcRef, kind: BlockKind) {
        let header = self.heap.checked_mut(block_ref, kind).header_mut();
        if header.is_reachable() {
            return;
        }
        header.mark();
        self.marked += 1;
        self.gray.push((block_ref, kind));
    }

    fn drain(&mut self) {
        let mut children = Vec::new();
        while let Some((block_ref, kind)) = self.gray.pop() {
            let block = self.heap.checked_mut(block_ref, kind);
            trace(block.object(), &mut children);
            for (child, child_kind) in children.drain(..) {
                self.shade(child, child_kind);
            }
        }
    }
}

fn push_value(out: &mut Vec<GrayEntry>, value: Value) {
    if let Some(entry) = value.heap_ref() {
        out.push(entry);
    }
}

/// Collect the direct references held by `object`
fn trace(object: &HeapObject, out: &mut Vec<GrayEntry>) {
    match object {
        HeapObject::String(_) | HeapObject::Buffer(_) | HeapObject::Userdata(_) => {}

        HeapObject::Array(array) => {
            for &value in array.items() {
                push_value(out, value);
            }
        }

        HeapObject::Table(table) => {
            for (key, value) in table.iter() {
                push_value(out, key);
                push_value(out, value);
            }
        }

        HeapObject::Struct(st) => {
            for &(key, value) in st.pairs() {
                push_value(out, key);
                push_value(out, value);
            }
        }

        HeapObject::Tuple(tuple) => {
            for &value in tuple.items() {
                push_value(out, value);
            }
        }

        HeapObject::Function(func) => {
            for env in func.envs().iter().flatten() {
                out.push((*env, BlockKind::FuncEnv));
            }
            out.push((func.def(), BlockKind::FuncDef));
        }

        HeapObject::FuncDef(def) => {
            for constant in def.constants() {
                match *constant {
                    Constant::Value(value) => push_value(out, value),
                    Constant::Template(template) => out.push((template, BlockKind::FuncDef)),
                }
            }
        }

        HeapObject::FuncEnv(env) => match env.storage() {
            // The fiber's stack holds the values; marking the fiber covers them.
            EnvStorage::Open { fiber, .. } => out.push((*fiber, BlockKind::Fiber)),
            EnvStorage::Closed(values) => {
                for &value in values.iter() {
                    push_value(out, value);
                }
            }
        },

        HeapObject::Fiber(fiber) => {
            let mut frames = fiber.frames();
            for frame in frames.by_ref() {
                if let Some(func) = frame.func() {
                    out.push((func, BlockKind::Function));
                }
                for value in frame.values() {
                    push_value(out, value);
                }
            }
            // Slots pushed before the base frame was opened
            for value in frames.remainder() {
                push_value(out, value);
            }
            if let Some(parent) = fiber.parent() {
                out.push((parent, BlockKind::Fiber));
            }
            push_value(out, fiber.ret());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Array, Fiber, FuncDef, FuncEnv, Function, HeapString, Table};

    fn is_marked(heap: &BlockHeap, r: GcRef) -> bool {
        heap.get(r).unwrap().header().is_reachable()
    }

    #[test]
    fn test_mark_array_children() {
        let mut heap = BlockHeap::default();
        let s = heap.allocate(HeapString::from("a").into());
        let loose = heap.allocate(HeapString::from("b").into());
        let arr = heap.allocate(Array::from(vec![Value::String(s), Value::Integer(3)]).into());

        let mut marker = Marker::new(&mut heap);
        marker.mark_value(Value::Array(arr));
        assert_eq!(marker.marked(), 2);

        assert!(is_marked(&heap, arr));
        assert!(is_marked(&heap, s));
        assert!(!is_marked(&heap, loose));
    }

    #[test]
    fn test_mark_self_referencing_table() {
        let mut heap = BlockHeap::default();
        let t = heap.allocate(Table::new().into());
        if let HeapObject::Table(table) = heap.get_mut(t).unwrap().object_mut() {
            table.put(Value::Table(t), Value::Table(t));
        }

        let mut marker = Marker::new(&mut heap);
        marker.mark_value(Value::Table(t));
        assert_eq!(marker.marked(), 1);
    }

    #[test]
    fn test_mark_is_idempotent() {
        let mut heap = BlockHeap::default();
        let arr = heap.allocate(Array::new().into());

        let mut marker = Marker::new(&mut heap);
        marker.mark_value(Value::Array(arr));
        marker.mark_value(Value::Array(arr));
        assert_eq!(marker.marked(), 1);
    }

    #[test]
    fn test_mark_function_env_and_templates() {
        let mut heap = BlockHeap::default();
        let inner = heap.allocate(FuncDef::new(vec![], vec![]).into());
        let s = heap.allocate(HeapString::from("k").into());
        let def = heap.allocate(
            FuncDef::new(
                vec![],
                vec![Constant::Value(Value::String(s)), Constant::Template(inner)],
            )
            .into(),
        );
        let captured = heap.allocate(Array::new().into());
        let env = heap.allocate(FuncEnv::closed(vec![Value::Array(captured)]).into());
        let func = heap.allocate(Function::new(def, vec![None, Some(env)]).into());

        let mut marker = Marker::new(&mut heap);
        marker.mark_value(Value::Function(func));

        for r in [func, def, inner, s, env, captured] {
            assert!(is_marked(&heap, r), "{:?} should be marked", r);
        }
    }

    #[test]
    fn test_mark_open_env_marks_fiber() {
        let mut heap = BlockHeap::default();
        let held = heap.allocate(Array::new().into());
        let mut fiber = Fiber::new(4);
        fiber.push_frame(None);
        fiber.push(Value::Array(held));
        let fiber = heap.allocate(fiber.into());
        let env = heap.allocate(FuncEnv::open(fiber, 1, 1).into());

        let mut marker = Marker::new(&mut heap);
        marker.mark_block(env, BlockKind::FuncEnv);

        assert!(is_marked(&heap, fiber));
        assert!(is_marked(&heap, held));
    }

    #[test]
    fn test_mark_fiber_frames_parent_and_return() {
        let mut heap = BlockHeap::default();
        let def = heap.allocate(FuncDef::new(vec![], vec![]).into());
        let func = heap.allocate(Function::new(def, vec![]).into());
        let below_base = heap.allocate(Array::new().into());
        let local = heap.allocate(Array::new().into());
        let ret = heap.allocate(Table::new().into());
        let parent = heap.allocate(Fiber::new(0).into());

        let mut fiber = Fiber::new(8);
        fiber.push(Value::Array(below_base));
        fiber.push_frame(None);
        fiber.push_frame(Some(func));
        fiber.push(Value::Array(local));
        fiber.set_parent(Some(parent));
        fiber.set_return(Value::Table(ret));
        let fiber = heap.allocate(fiber.into());

        let mut marker = Marker::new(&mut heap);
        marker.mark_value(Value::Fiber(fiber));

        for r in [fiber, func, def, below_base, local, ret, parent] {
            assert!(is_marked(&heap, r), "{:?} should be marked", r);
        }
    }

    #[test]
    #[should_panic(expected = "heap invariant violated")]
    fn test_mark_kind_mismatch_panics() {
        let mut heap = BlockHeap::default();
        let t = heap.allocate(Table::new().into());
        Marker::new(&mut heap).mark_value(Value::Array(t));
    }

    #[test]
    #[should_panic(expected = "heap invariant violated")]
    fn test_mark_stale_child_panics() {
        let mut heap = BlockHeap::default();
        let gone = heap.allocate(Table::new().into());
        let arr = heap.allocate(Array::from(vec![Value::Table(gone)]).into());
        heap.free(gone.index());
        Marker::new(&mut heap).mark_value(Value::Array(arr));
    }
}
