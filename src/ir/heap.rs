//! A minimal model of the managed heap, as seen by the compiler.
//!
//! Heap constants in the graph are [`HeapRef`] handles into a [`Heap`]. The
//! only objects the passes look into are lexical contexts (a parent link and
//! a slot array); the rest are opaque values that flow into instructions as
//! constants.

use std::fmt;

use crate::core::{CompileError, CompileResult};

/// Handle to an object in a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapRef(u32);

impl HeapRef {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for HeapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Heap object kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum HeapObject {
    Undefined,
    /// Marker stored in slots that have not been initialized yet.
    TheHole,
    Number(f64),
    String(String),
    Context {
        parent: Option<HeapRef>,
        slots: Vec<HeapRef>,
    },
    Code {
        name: String,
    },
    Function {
        name: String,
        context: HeapRef,
    },
}

/// Object store backing heap constants.
#[derive(Debug, Clone)]
pub struct Heap {
    objects: Vec<HeapObject>,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    const UNDEFINED: HeapRef = HeapRef(0);
    const THE_HOLE: HeapRef = HeapRef(1);

    pub fn new() -> Self {
        Self {
            objects: vec![HeapObject::Undefined, HeapObject::TheHole],
        }
    }

    pub fn undefined(&self) -> HeapRef {
        Self::UNDEFINED
    }

    pub fn the_hole(&self) -> HeapRef {
        Self::THE_HOLE
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn allocate(&mut self, object: HeapObject) -> HeapRef {
        let handle = HeapRef(self.objects.len() as u32);
        self.objects.push(object);
        handle
    }

    pub fn number(&mut self, value: f64) -> HeapRef {
        self.allocate(HeapObject::Number(value))
    }

    pub fn string(&mut self, value: &str) -> HeapRef {
        self.allocate(HeapObject::String(value.to_string()))
    }

    pub fn code(&mut self, name: &str) -> HeapRef {
        self.allocate(HeapObject::Code {
            name: name.to_string(),
        })
    }

    /// A fresh context whose slots all hold the hole.
    pub fn context(&mut self, parent: Option<HeapRef>, slot_count: usize) -> HeapRef {
        let slots = vec![Self::THE_HOLE; slot_count];
        self.allocate(HeapObject::Context { parent, slots })
    }

    pub fn get(&self, handle: HeapRef) -> CompileResult<&HeapObject> {
        self.objects.get(handle.index()).ok_or_else(|| {
            CompileError::invariant(format!("heap handle {} is out of range", handle))
        })
    }

    pub fn is_context(&self, handle: HeapRef) -> bool {
        matches!(self.objects.get(handle.index()), Some(HeapObject::Context { .. }))
    }

    pub fn is_code(&self, handle: HeapRef) -> bool {
        matches!(self.objects.get(handle.index()), Some(HeapObject::Code { .. }))
    }

    /// True for the two sentinels a not yet initialized slot may hold.
    pub fn is_uninitialized(&self, handle: HeapRef) -> bool {
        handle == Self::UNDEFINED || handle == Self::THE_HOLE
    }

    /// Parent of `context`, or `None` for an outermost context.
    pub fn context_parent(&self, context: HeapRef) -> CompileResult<Option<HeapRef>> {
        match self.get(context)? {
            HeapObject::Context { parent, .. } => Ok(*parent),
            _ => Err(CompileError::invariant(format!("{} is not a context", context))),
        }
    }

    /// Follow `depth` parent links starting at `context`.
    pub fn context_ancestor(&self, context: HeapRef, depth: u32) -> CompileResult<HeapRef> {
        let mut current = context;
        for _ in 0..depth {
            current = self.context_parent(current)?.ok_or_else(|| {
                CompileError::invariant(format!(
                    "context chain of {} is shorter than {}",
                    context, depth
                ))
            })?;
        }
        Ok(current)
    }

    pub fn context_slot(&self, context: HeapRef, index: u32) -> CompileResult<HeapRef> {
        match self.get(context)? {
            HeapObject::Context { slots, .. } => slots.get(index as usize).copied().ok_or_else(|| {
                CompileError::invariant(format!("{} has no slot {}", context, index))
            }),
            _ => Err(CompileError::invariant(format!("{} is not a context", context))),
        }
    }

    pub fn set_context_slot(&mut self, context: HeapRef, index: u32, value: HeapRef) -> CompileResult<()> {
        match self.objects.get_mut(context.index()) {
            Some(HeapObject::Context { slots, .. }) => {
                let slot = slots.get_mut(index as usize).ok_or_else(|| {
                    CompileError::invariant(format!("{} has no slot {}", context, index))
                })?;
                *slot = value;
                Ok(())
            }
            _ => Err(CompileError::invariant(format!("{} is not a context", context))),
        }
    }
}
