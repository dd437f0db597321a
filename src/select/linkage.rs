// This module holds the calling-convention metadata the instruction selector consumes. A
// CallDescriptor lists, for one kind of call, the location of the callee and of every
// argument (input 0 is always the callee) and of every return value, together with how the
// callee is reached (code object, raw address or managed function object) and whether the
// call may lazily deoptimize. Locations are either fixed registers, fixed double registers,
// caller pushed stack slots addressed by negative index, or "any register" for operands the
// register allocator may place freely. The Linkage wraps the descriptor of the function
// being compiled and answers where its parameters arrive and where its result goes.
// Concrete descriptors for a target come from that target's calling convention module.

//! Call descriptors and linkage locations.

use std::rc::Rc;

use crate::core::{CompileError, CompileResult};
use crate::ir::MachineType;

/// Where a value lives at a call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    /// A specific general purpose register.
    Register(u8),
    /// A specific floating point register.
    DoubleRegister(u8),
    /// A caller pushed stack slot. Slot `-1` is the last pushed argument.
    StackSlot(i32),
    /// Any register the allocator picks.
    AnyRegister,
}

/// A location together with the representation of the value in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkageLocation {
    pub representation: MachineType,
    pub kind: LocationKind,
}

impl LinkageLocation {
    pub const fn register(representation: MachineType, code: u8) -> Self {
        Self {
            representation,
            kind: LocationKind::Register(code),
        }
    }

    pub const fn double_register(code: u8) -> Self {
        Self {
            representation: MachineType::Float64,
            kind: LocationKind::DoubleRegister(code),
        }
    }

    pub const fn stack_slot(representation: MachineType, slot: i32) -> Self {
        Self {
            representation,
            kind: LocationKind::StackSlot(slot),
        }
    }

    pub const fn any_register(representation: MachineType) -> Self {
        Self {
            representation,
            kind: LocationKind::AnyRegister,
        }
    }

    pub fn is_stack_slot(&self) -> bool {
        matches!(self.kind, LocationKind::StackSlot(_))
    }
}

/// How the callee of a call is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Call into a code object (a heap constant).
    CodeObject,
    /// Call to a raw machine address.
    Address,
    /// Call through a managed function object.
    JSFunction,
}

/// Calling convention of one call site or one incoming function.
#[derive(Debug, Clone, PartialEq)]
pub struct CallDescriptor {
    kind: CallKind,
    return_locations: Vec<LinkageLocation>,
    input_locations: Vec<LinkageLocation>,
    lazy_deoptimization: bool,
    debug_name: String,
}

impl CallDescriptor {
    /// `input_locations[0]` is the callee.
    pub fn new(
        kind: CallKind,
        return_locations: Vec<LinkageLocation>,
        input_locations: Vec<LinkageLocation>,
        lazy_deoptimization: bool,
        debug_name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            return_locations,
            input_locations,
            lazy_deoptimization,
            debug_name: debug_name.into(),
        }
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// Number of value inputs, callee included.
    pub fn input_count(&self) -> usize {
        self.input_locations.len()
    }

    pub fn return_count(&self) -> usize {
        self.return_locations.len()
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn can_lazily_deoptimize(&self) -> bool {
        self.lazy_deoptimization
    }

    pub fn input_location(&self, index: usize) -> CompileResult<LinkageLocation> {
        self.input_locations.get(index).copied().ok_or_else(|| {
            CompileError::invariant(format!(
                "call descriptor {} has no input {}",
                self.debug_name, index
            ))
        })
    }

    pub fn return_location(&self, index: usize) -> CompileResult<LinkageLocation> {
        self.return_locations.get(index).copied().ok_or_else(|| {
            CompileError::invariant(format!(
                "call descriptor {} has no return {}",
                self.debug_name, index
            ))
        })
    }

    /// Number of inputs passed in caller pushed stack slots.
    pub fn stack_parameter_count(&self) -> usize {
        self.input_locations.iter().filter(|l| l.is_stack_slot()).count()
    }
}

/// Linkage of the function being compiled.
#[derive(Debug, Clone)]
pub struct Linkage {
    incoming: Rc<CallDescriptor>,
}

impl Linkage {
    pub fn new(incoming: Rc<CallDescriptor>) -> Self {
        Self { incoming }
    }

    pub fn incoming_descriptor(&self) -> &CallDescriptor {
        &self.incoming
    }

    /// Location parameter `index` arrives in. Parameters follow the callee
    /// in the incoming descriptor.
    pub fn parameter_location(&self, index: u32) -> CompileResult<LinkageLocation> {
        self.incoming.input_location(index as usize + 1)
    }

    /// Location the single return value is passed in.
    pub fn return_location(&self) -> CompileResult<LinkageLocation> {
        self.incoming.return_location(0)
    }
}
