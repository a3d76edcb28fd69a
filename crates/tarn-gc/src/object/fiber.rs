//! Fiber payload
//!
//! A fiber is a cooperative execution context with one contiguous stack. The
//! stack is partitioned into frames; each frame starts with a header slot
//! followed by that frame's values:
//!
//! ```text
//! slot:   0        1   2      3        4
//!       ┌────────┬───┬─────┬────────┬───────┐
//!       │ hdr #0 │ 1 │ "x" │ hdr #1 │ T     │
//!       │ prev=0 │   │     │ prev=1 │       │
//!       └────────┴───┴─────┴────────┴───────┘
//!                ▲                 ▲        ▲
//!                frame #0          frame    frametop
//! ```
//!
//! `frame` is the slot just past the current frame's header (0 when the fiber
//! has no frames) and each header's `prevframe` is the `frame` value of the
//! caller, so the stack can be walked top-down without any side table.

use crate::value::{GcRef, Value};
use crate::{GcError, GcResult};

/// Number of stack slots a frame header occupies
pub const FRAME_SIZE: usize = 1;

/// Frame header stored inline in the fiber stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFrame {
    /// Closure being executed, `None` for native or trampoline frames
    pub func: Option<GcRef>,
    /// `frame` index of the calling frame, 0 at the base
    pub prevframe: usize,
}

/// One slot of a fiber stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSlot {
    /// Value slot
    Value(Value),
    /// Frame header
    Frame(StackFrame),
}

impl StackSlot {
    /// Value held by this slot, if it is a value slot
    #[inline]
    pub fn as_value(&self) -> Option<Value> {
        match self {
            StackSlot::Value(v) => Some(*v),
            StackSlot::Frame(_) => None,
        }
    }
}

/// Cooperative execution context
#[derive(Debug, Clone, Default)]
pub struct Fiber {
    data: Vec<StackSlot>,
    frame: usize,
    parent: Option<GcRef>,
    ret: Value,
}

impl Fiber {
    /// Create a fiber with room for `capacity` stack slots
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Slot just past the current frame header; 0 with no frames
    #[inline]
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Top of the stack (one past the last slot)
    #[inline]
    pub fn frametop(&self) -> usize {
        self.data.len()
    }

    /// Allocated stack capacity in slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Push a value onto the current frame
    pub fn push(&mut self, value: Value) {
        self.data.push(StackSlot::Value(value));
    }

    /// Open a new frame at the top of the stack
    pub fn push_frame(&mut self, func: Option<GcRef>) {
        self.data.push(StackSlot::Frame(StackFrame {
            func,
            prevframe: self.frame,
        }));
        self.frame = self.data.len();
    }

    /// Discard the current frame and its values, returning to the caller
    pub fn pop_frame(&mut self) -> GcResult<StackFrame> {
        let header = self.current_frame().ok_or(GcError::NoFrame)?;
        self.data.truncate(self.frame - FRAME_SIZE);
        self.frame = header.prevframe;
        Ok(header)
    }

    /// Header of the current frame
    pub fn current_frame(&self) -> Option<StackFrame> {
        if self.frame == 0 {
            return None;
        }
        match self.data.get(self.frame - FRAME_SIZE) {
            Some(StackSlot::Frame(header)) => Some(*header),
            _ => None,
        }
    }

    /// Walk frames from the top of the stack down to the base
    pub fn frames(&self) -> Frames<'_> {
        Frames {
            data: &self.data,
            frame: self.frame,
            top: self.data.len(),
        }
    }

    /// Number of frames on the stack
    pub fn frame_depth(&self) -> usize {
        self.frames().count()
    }

    /// Read a value slot
    pub fn value_at(&self, slot: usize) -> Option<Value> {
        self.data.get(slot).and_then(StackSlot::as_value)
    }

    /// Overwrite a value slot. Returns false for header slots or past the top.
    pub fn set_value_at(&mut self, slot: usize, value: Value) -> bool {
        match self.data.get_mut(slot) {
            Some(StackSlot::Value(v)) => {
                *v = value;
                true
            }
            _ => false,
        }
    }

    /// Copy `length` values starting at `offset`, as captured by an environment
    pub fn captured(&self, offset: usize, length: usize) -> GcResult<Vec<Value>> {
        let out_of_bounds = |end| GcError::EnvOutOfBounds {
            offset,
            end,
            len: self.data.len(),
        };
        let end = offset
            .checked_add(length)
            .ok_or_else(|| out_of_bounds(usize::MAX))?;
        let slots = self.data.get(offset..end).ok_or_else(|| out_of_bounds(end))?;
        Ok(slots
            .iter()
            .map(|slot| slot.as_value().unwrap_or(Value::Nil))
            .collect())
    }

    /// Fiber to resume when this one finishes
    #[inline]
    pub fn parent(&self) -> Option<GcRef> {
        self.parent
    }

    /// Set the parent fiber
    pub fn set_parent(&mut self, parent: Option<GcRef>) {
        self.parent = parent;
    }

    /// Pending return value
    #[inline]
    pub fn ret(&self) -> Value {
        self.ret
    }

    /// Set the pending return value
    pub fn set_return(&mut self, value: Value) {
        self.ret = value;
    }
}

/// Top-down iterator over a fiber's frames
pub struct Frames<'a> {
    data: &'a [StackSlot],
    frame: usize,
    top: usize,
}

impl<'a> Frames<'a> {
    /// Value slots below the lowest frame visited so far. Once the iterator is
    /// exhausted these are the slots pushed before the base frame.
    pub fn remainder(&self) -> impl Iterator<Item = Value> + 'a {
        let data: &'a [StackSlot] = self.data;
        data[..self.top].iter().filter_map(StackSlot::as_value)
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = FrameView<'a>;

    fn next(&mut self) -> Option<FrameView<'a>> {
        if self.frame == 0 {
            return None;
        }
        let header = match self.data.get(self.frame - FRAME_SIZE) {
            Some(StackSlot::Frame(header)) => *header,
            _ => panic!(
                "corrupt fiber stack: no frame header at slot {}",
                self.frame - FRAME_SIZE
            ),
        };
        debug_assert!(header.prevframe < self.frame, "frame chain must descend");

        let view = FrameView {
            header,
            base: self.frame,
            slots: &self.data[self.frame..self.top],
        };
        self.top = self.frame - FRAME_SIZE;
        self.frame = header.prevframe;
        Some(view)
    }
}

/// One frame of a fiber stack
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    header: StackFrame,
    base: usize,
    slots: &'a [StackSlot],
}

impl<'a> FrameView<'a> {
    /// Frame header
    #[inline]
    pub fn header(&self) -> StackFrame {
        self.header
    }

    /// Closure running in this frame
    #[inline]
    pub fn func(&self) -> Option<GcRef> {
        self.header.func
    }

    /// Stack slot of the frame's first value
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    /// The frame's values, bottom to top
    pub fn values(&self) -> impl Iterator<Item = Value> + 'a {
        self.slots.iter().filter_map(StackSlot::as_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_frame_fiber() -> Fiber {
        let mut fiber = Fiber::new(8);
        fiber.push_frame(None);
        fiber.push(Value::Integer(1));
        fiber.push(Value::Boolean(true));
        fiber.push_frame(Some(GcRef::new(7, 0)));
        fiber.push(Value::Integer(2));
        fiber
    }

    #[test]
    fn test_frames_walk_top_down() {
        let fiber = two_frame_fiber();
        assert_eq!(fiber.frame(), 4);
        assert_eq!(fiber.frametop(), 5);

        let frames: Vec<_> = fiber.frames().collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].func(), Some(GcRef::new(7, 0)));
        assert_eq!(frames[0].values().collect::<Vec<_>>(), vec![Value::Integer(2)]);
        assert_eq!(frames[1].func(), None);
        assert_eq!(
            frames[1].values().collect::<Vec<_>>(),
            vec![Value::Integer(1), Value::Boolean(true)]
        );
    }

    #[test]
    fn test_pop_frame_restores_caller() {
        let mut fiber = two_frame_fiber();
        let header = fiber.pop_frame().unwrap();
        assert_eq!(header.func, Some(GcRef::new(7, 0)));
        assert_eq!(fiber.frame(), 1);
        assert_eq!(fiber.frametop(), 3);
        assert_eq!(fiber.frame_depth(), 1);

        fiber.pop_frame().unwrap();
        assert_eq!(fiber.frame(), 0);
        assert_eq!(fiber.pop_frame(), Err(GcError::NoFrame));
    }

    #[test]
    fn test_values_below_base_frame() {
        let mut fiber = Fiber::new(4);
        fiber.push(Value::Integer(9));
        fiber.push_frame(None);
        fiber.push(Value::Integer(1));

        let mut frames = fiber.frames();
        assert_eq!(frames.by_ref().count(), 1);
        assert_eq!(frames.remainder().collect::<Vec<_>>(), vec![Value::Integer(9)]);
    }

    #[test]
    fn test_captured_bounds() {
        let fiber = two_frame_fiber();
        assert_eq!(
            fiber.captured(1, 2).unwrap(),
            vec![Value::Integer(1), Value::Boolean(true)]
        );
        assert_eq!(
            fiber.captured(4, 3),
            Err(GcError::EnvOutOfBounds { offset: 4, end: 7, len: 5 })
        );
    }

    #[test]
    fn test_captured_range_overflow() {
        let fiber = two_frame_fiber();
        assert_eq!(
            fiber.captured(usize::MAX, 2),
            Err(GcError::EnvOutOfBounds {
                offset: usize::MAX,
                end: usize::MAX,
                len: 5
            })
        );
    }

    #[test]
    fn test_set_value_rejects_header_slot() {
        let mut fiber = two_frame_fiber();
        assert!(!fiber.set_value_at(0, Value::Nil));
        assert!(fiber.set_value_at(4, Value::Integer(5)));
        assert_eq!(fiber.value_at(4), Some(Value::Integer(5)));
    }
}
