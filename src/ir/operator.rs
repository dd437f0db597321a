// This module defines the operator catalogue of the graph IR as a single tagged union. Each
// variant carries its own strongly typed payload (parameter index, constant value, context
// access, machine representation, call descriptor, bailout id) and the enum answers every
// static property the passes need: the value/effect/control input layout that determines the
// kind of each positional input edge, the value/effect/control outputs, whether a node is
// eliminatable when unused, and the mnemonic used in dumps and diagnostics. Matching on this
// enum is exhaustive everywhere, so adding an operator without a lowering rule fails to build.

//! Operators of the graph IR.

use std::fmt;
use std::rc::Rc;

use super::heap::HeapRef;
use super::node::EdgeKind;
use crate::select::linkage::CallDescriptor;

/// Machine-level representation of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineType {
    Word8,
    Word16,
    Word32,
    Word64,
    Float64,
    Tagged,
}

impl MachineType {
    pub fn name(self) -> &'static str {
        match self {
            MachineType::Word8 => "word8",
            MachineType::Word16 => "word16",
            MachineType::Word32 => "word32",
            MachineType::Word64 => "word64",
            MachineType::Float64 => "float64",
            MachineType::Tagged => "tagged",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "word8" => MachineType::Word8,
            "word16" => MachineType::Word16,
            "word32" => MachineType::Word32,
            "word64" => MachineType::Word64,
            "float64" => MachineType::Float64,
            "tagged" => MachineType::Tagged,
            _ => return None,
        })
    }
}

/// Whether a store must inform the garbage collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteBarrierKind {
    NoWriteBarrier,
    FullWriteBarrier,
}

/// Payload of a machine store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreRepresentation {
    pub rep: MachineType,
    pub write_barrier: WriteBarrierKind,
}

/// Static location of a lexical context slot relative to the accessing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextAccess {
    /// Number of parent links to follow.
    pub depth: u32,
    /// Slot index in the resolved context.
    pub index: u32,
    /// Whether the slot never changes after initialization.
    pub immutable: bool,
}

impl ContextAccess {
    pub const fn new(depth: u32, index: u32, immutable: bool) -> Self {
        Self {
            depth,
            index,
            immutable,
        }
    }
}

/// Identifier of the source position a deoptimization resumes at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BailoutId(pub u32);

/// Positional input layout: values first, then effects, then controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLayout {
    pub value: usize,
    pub effect: usize,
    pub control: usize,
}

impl InputLayout {
    const fn new(value: usize, effect: usize, control: usize) -> Self {
        Self {
            value,
            effect,
            control,
        }
    }

    pub const fn total(&self) -> usize {
        self.value + self.effect + self.control
    }
}

/// Outputs produced by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
    pub value: usize,
    pub effect: bool,
    pub control: bool,
}

impl OutputLayout {
    const fn new(value: usize, effect: bool, control: bool) -> Self {
        Self {
            value,
            effect,
            control,
        }
    }
}

/// An IR operator with its static parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    // Control.
    Start,
    End,
    Loop(u32),
    Merge(u32),
    Branch,
    IfTrue,
    IfFalse,
    Return,
    Throw,
    Deoptimize,
    Continuation,
    LazyDeoptimization,
    Dead,

    // Common.
    Parameter(u32),
    Phi(u32),
    EffectPhi(u32),
    Projection(u32),
    FrameState(BailoutId),
    StateValues(u32),
    Int32Constant(i32),
    Int64Constant(i64),
    Float64Constant(f64),
    ExternalConstant(u64),
    NumberConstant(f64),
    HeapConstant(HeapRef),
    Call(Rc<CallDescriptor>),
    DeoptimizeIf,

    // JavaScript context access.
    LoadContext(ContextAccess),
    StoreContext(ContextAccess),

    // Machine.
    Load(MachineType),
    Store(StoreRepresentation),
    Word32And,
    Word32Or,
    Word32Xor,
    Word32Shl,
    Word32Shr,
    Word32Sar,
    Word32Equal,
    Word64And,
    Word64Or,
    Word64Xor,
    Word64Shl,
    Word64Shr,
    Word64Sar,
    Word64Equal,
    Int32Add,
    Int32AddWithOverflow,
    Int32Sub,
    Int32SubWithOverflow,
    Int32Mul,
    Int32Div,
    Int32UDiv,
    Int32Mod,
    Int32UMod,
    Int32LessThan,
    Int32LessThanOrEqual,
    Uint32LessThan,
    Uint32LessThanOrEqual,
    Int64Add,
    Int64Sub,
    Int64Mul,
    Int64Div,
    Int64UDiv,
    Int64Mod,
    Int64UMod,
    Int64LessThan,
    Int64LessThanOrEqual,
    ConvertInt32ToInt64,
    ConvertInt64ToInt32,
    ChangeInt32ToFloat64,
    ChangeUint32ToFloat64,
    ChangeFloat64ToInt32,
    ChangeFloat64ToUint32,
    Float64Add,
    Float64Sub,
    Float64Mul,
    Float64Div,
    Float64Mod,
    Float64Equal,
    Float64LessThan,
    Float64LessThanOrEqual,
}

impl Operator {
    /// Input layout of the operator.
    pub fn inputs(&self) -> InputLayout {
        use Operator::*;
        match self {
            Start | Dead => InputLayout::new(0, 0, 0),
            End | IfTrue | IfFalse | Continuation | LazyDeoptimization => InputLayout::new(0, 0, 1),
            Loop(n) | Merge(n) => InputLayout::new(0, 0, *n as usize),
            Branch => InputLayout::new(1, 0, 1),
            Return | Throw | Deoptimize => InputLayout::new(1, 1, 1),
            Parameter(_) => InputLayout::new(0, 0, 1),
            Phi(n) => InputLayout::new(*n as usize, 0, 1),
            EffectPhi(n) => InputLayout::new(0, *n as usize, 1),
            Projection(_) => InputLayout::new(1, 0, 0),
            FrameState(_) => InputLayout::new(3, 0, 0),
            StateValues(n) => InputLayout::new(*n as usize, 0, 0),
            Int32Constant(_) | Int64Constant(_) | Float64Constant(_) | ExternalConstant(_)
            | NumberConstant(_) | HeapConstant(_) => InputLayout::new(0, 0, 0),
            Call(descriptor) => InputLayout::new(descriptor.input_count(), 1, 1),
            DeoptimizeIf => InputLayout::new(2, 1, 1),
            LoadContext(_) => InputLayout::new(1, 1, 0),
            StoreContext(_) => InputLayout::new(2, 1, 0),
            Load(_) => InputLayout::new(2, 1, 0),
            Store(_) => InputLayout::new(3, 1, 0),
            ConvertInt32ToInt64 | ConvertInt64ToInt32 | ChangeInt32ToFloat64
            | ChangeUint32ToFloat64 | ChangeFloat64ToInt32 | ChangeFloat64ToUint32 => {
                InputLayout::new(1, 0, 0)
            }
            _ => InputLayout::new(2, 0, 0),
        }
    }

    /// Total number of inputs a node with this operator must have.
    pub fn total_input_count(&self) -> usize {
        self.inputs().total()
    }

    /// Outputs of the operator.
    pub fn outputs(&self) -> OutputLayout {
        use Operator::*;
        match self {
            Start => OutputLayout::new(0, true, true),
            End | Dead => OutputLayout::new(0, false, false),
            Loop(_) | Merge(_) | Branch | IfTrue | IfFalse | Continuation | LazyDeoptimization => {
                OutputLayout::new(0, false, true)
            }
            Return | Throw | Deoptimize => OutputLayout::new(0, false, true),
            EffectPhi(_) => OutputLayout::new(0, true, false),
            Call(descriptor) => OutputLayout::new(descriptor.return_count(), true, true),
            DeoptimizeIf => OutputLayout::new(0, true, true),
            LoadContext(_) | Load(_) => OutputLayout::new(1, true, false),
            StoreContext(_) | Store(_) => OutputLayout::new(0, true, false),
            Int32AddWithOverflow | Int32SubWithOverflow => OutputLayout::new(2, false, false),
            _ => OutputLayout::new(1, false, false),
        }
    }

    /// Kind of input edge `index` under this operator's layout.
    pub fn edge_kind(&self, index: usize) -> EdgeKind {
        let layout = self.inputs();
        if index < layout.value {
            EdgeKind::Value
        } else if index < layout.value + layout.effect {
            EdgeKind::Effect
        } else {
            EdgeKind::Control
        }
    }

    /// Nodes with eliminatable operators may be dropped when nothing uses them.
    pub fn is_eliminatable(&self) -> bool {
        use Operator::*;
        !matches!(
            self,
            Start
                | End
                | Loop(_)
                | Merge(_)
                | Branch
                | IfTrue
                | IfFalse
                | Return
                | Throw
                | Deoptimize
                | Continuation
                | LazyDeoptimization
                | Dead
                | EffectPhi(_)
                | Call(_)
                | DeoptimizeIf
                | StoreContext(_)
                | Store(_)
        )
    }

    pub fn is_constant(&self) -> bool {
        use Operator::*;
        matches!(
            self,
            Int32Constant(_)
                | Int64Constant(_)
                | Float64Constant(_)
                | ExternalConstant(_)
                | NumberConstant(_)
                | HeapConstant(_)
        )
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Operator::Phi(_))
    }

    /// Short name used in dumps and diagnostics.
    pub fn mnemonic(&self) -> &'static str {
        use Operator::*;
        match self {
            Start => "Start",
            End => "End",
            Loop(_) => "Loop",
            Merge(_) => "Merge",
            Branch => "Branch",
            IfTrue => "IfTrue",
            IfFalse => "IfFalse",
            Return => "Return",
            Throw => "Throw",
            Deoptimize => "Deoptimize",
            Continuation => "Continuation",
            LazyDeoptimization => "LazyDeoptimization",
            Dead => "Dead",
            Parameter(_) => "Parameter",
            Phi(_) => "Phi",
            EffectPhi(_) => "EffectPhi",
            Projection(_) => "Projection",
            FrameState(_) => "FrameState",
            StateValues(_) => "StateValues",
            Int32Constant(_) => "Int32Constant",
            Int64Constant(_) => "Int64Constant",
            Float64Constant(_) => "Float64Constant",
            ExternalConstant(_) => "ExternalConstant",
            NumberConstant(_) => "NumberConstant",
            HeapConstant(_) => "HeapConstant",
            Call(_) => "Call",
            DeoptimizeIf => "DeoptimizeIf",
            LoadContext(_) => "LoadContext",
            StoreContext(_) => "StoreContext",
            Load(_) => "Load",
            Store(_) => "Store",
            Word32And => "Word32And",
            Word32Or => "Word32Or",
            Word32Xor => "Word32Xor",
            Word32Shl => "Word32Shl",
            Word32Shr => "Word32Shr",
            Word32Sar => "Word32Sar",
            Word32Equal => "Word32Equal",
            Word64And => "Word64And",
            Word64Or => "Word64Or",
            Word64Xor => "Word64Xor",
            Word64Shl => "Word64Shl",
            Word64Shr => "Word64Shr",
            Word64Sar => "Word64Sar",
            Word64Equal => "Word64Equal",
            Int32Add => "Int32Add",
            Int32AddWithOverflow => "Int32AddWithOverflow",
            Int32Sub => "Int32Sub",
            Int32SubWithOverflow => "Int32SubWithOverflow",
            Int32Mul => "Int32Mul",
            Int32Div => "Int32Div",
            Int32UDiv => "Int32UDiv",
            Int32Mod => "Int32Mod",
            Int32UMod => "Int32UMod",
            Int32LessThan => "Int32LessThan",
            Int32LessThanOrEqual => "Int32LessThanOrEqual",
            Uint32LessThan => "Uint32LessThan",
            Uint32LessThanOrEqual => "Uint32LessThanOrEqual",
            Int64Add => "Int64Add",
            Int64Sub => "Int64Sub",
            Int64Mul => "Int64Mul",
            Int64Div => "Int64Div",
            Int64UDiv => "Int64UDiv",
            Int64Mod => "Int64Mod",
            Int64UMod => "Int64UMod",
            Int64LessThan => "Int64LessThan",
            Int64LessThanOrEqual => "Int64LessThanOrEqual",
            ConvertInt32ToInt64 => "ConvertInt32ToInt64",
            ConvertInt64ToInt32 => "ConvertInt64ToInt32",
            ChangeInt32ToFloat64 => "ChangeInt32ToFloat64",
            ChangeUint32ToFloat64 => "ChangeUint32ToFloat64",
            ChangeFloat64ToInt32 => "ChangeFloat64ToInt32",
            ChangeFloat64ToUint32 => "ChangeFloat64ToUint32",
            Float64Add => "Float64Add",
            Float64Sub => "Float64Sub",
            Float64Mul => "Float64Mul",
            Float64Div => "Float64Div",
            Float64Mod => "Float64Mod",
            Float64Equal => "Float64Equal",
            Float64LessThan => "Float64LessThan",
            Float64LessThanOrEqual => "Float64LessThanOrEqual",
        }
    }

    /// Parameterless operator by mnemonic. Operators with payloads are
    /// constructed by the text IR parser directly.
    pub fn simple_from_mnemonic(name: &str) -> Option<Self> {
        use Operator::*;
        Some(match name {
            "Start" => Start,
            "End" => End,
            "Branch" => Branch,
            "IfTrue" => IfTrue,
            "IfFalse" => IfFalse,
            "Return" => Return,
            "Throw" => Throw,
            "Deoptimize" => Deoptimize,
            "Continuation" => Continuation,
            "LazyDeoptimization" => LazyDeoptimization,
            "Dead" => Dead,
            "DeoptimizeIf" => DeoptimizeIf,
            "Word32And" => Word32And,
            "Word32Or" => Word32Or,
            "Word32Xor" => Word32Xor,
            "Word32Shl" => Word32Shl,
            "Word32Shr" => Word32Shr,
            "Word32Sar" => Word32Sar,
            "Word32Equal" => Word32Equal,
            "Word64And" => Word64And,
            "Word64Or" => Word64Or,
            "Word64Xor" => Word64Xor,
            "Word64Shl" => Word64Shl,
            "Word64Shr" => Word64Shr,
            "Word64Sar" => Word64Sar,
            "Word64Equal" => Word64Equal,
            "Int32Add" => Int32Add,
            "Int32AddWithOverflow" => Int32AddWithOverflow,
            "Int32Sub" => Int32Sub,
            "Int32SubWithOverflow" => Int32SubWithOverflow,
            "Int32Mul" => Int32Mul,
            "Int32Div" => Int32Div,
            "Int32UDiv" => Int32UDiv,
            "Int32Mod" => Int32Mod,
            "Int32UMod" => Int32UMod,
            "Int32LessThan" => Int32LessThan,
            "Int32LessThanOrEqual" => Int32LessThanOrEqual,
            "Uint32LessThan" => Uint32LessThan,
            "Uint32LessThanOrEqual" => Uint32LessThanOrEqual,
            "Int64Add" => Int64Add,
            "Int64Sub" => Int64Sub,
            "Int64Mul" => Int64Mul,
            "Int64Div" => Int64Div,
            "Int64UDiv" => Int64UDiv,
            "Int64Mod" => Int64Mod,
            "Int64UMod" => Int64UMod,
            "Int64LessThan" => Int64LessThan,
            "Int64LessThanOrEqual" => Int64LessThanOrEqual,
            "ConvertInt32ToInt64" => ConvertInt32ToInt64,
            "ConvertInt64ToInt32" => ConvertInt64ToInt32,
            "ChangeInt32ToFloat64" => ChangeInt32ToFloat64,
            "ChangeUint32ToFloat64" => ChangeUint32ToFloat64,
            "ChangeFloat64ToInt32" => ChangeFloat64ToInt32,
            "ChangeFloat64ToUint32" => ChangeFloat64ToUint32,
            "Float64Add" => Float64Add,
            "Float64Sub" => Float64Sub,
            "Float64Mul" => Float64Mul,
            "Float64Div" => Float64Div,
            "Float64Mod" => Float64Mod,
            "Float64Equal" => Float64Equal,
            "Float64LessThan" => Float64LessThan,
            "Float64LessThanOrEqual" => Float64LessThanOrEqual,
            _ => return None,
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Operator::*;
        let name = self.mnemonic();
        match self {
            Loop(n) | Merge(n) | Phi(n) | EffectPhi(n) | StateValues(n) => write!(f, "{}[{}]", name, n),
            Parameter(i) | Projection(i) => write!(f, "{}[{}]", name, i),
            FrameState(id) => write!(f, "{}[{}]", name, id.0),
            Int32Constant(v) => write!(f, "{}[{}]", name, v),
            Int64Constant(v) => write!(f, "{}[{}]", name, v),
            Float64Constant(v) | NumberConstant(v) => write!(f, "{}[{}]", name, v),
            ExternalConstant(v) => write!(f, "{}[{:#x}]", name, v),
            HeapConstant(h) => write!(f, "{}[{}]", name, h),
            Call(d) => write!(f, "{}[{}]", name, d.debug_name()),
            LoadContext(a) | StoreContext(a) => write!(
                f,
                "{}[{}, {}, {}]",
                name,
                a.depth,
                a.index,
                if a.immutable { "immutable" } else { "mutable" }
            ),
            Load(rep) => write!(f, "{}[{}]", name, rep.name()),
            Store(rep) => match rep.write_barrier {
                WriteBarrierKind::NoWriteBarrier => write!(f, "{}[{}]", name, rep.rep.name()),
                WriteBarrierKind::FullWriteBarrier => write!(f, "{}[{}, barrier]", name, rep.rep.name()),
            },
            _ => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kinds_follow_layout() {
        let ret = Operator::Return;
        assert_eq!(ret.edge_kind(0), EdgeKind::Value);
        assert_eq!(ret.edge_kind(1), EdgeKind::Effect);
        assert_eq!(ret.edge_kind(2), EdgeKind::Control);

        let phi = Operator::Phi(3);
        assert_eq!(phi.total_input_count(), 4);
        assert_eq!(phi.edge_kind(2), EdgeKind::Value);
        assert_eq!(phi.edge_kind(3), EdgeKind::Control);
    }

    #[test]
    fn test_eliminatable_flags() {
        assert!(Operator::Int32Add.is_eliminatable());
        assert!(Operator::Parameter(0).is_eliminatable());
        assert!(!Operator::Branch.is_eliminatable());
        assert!(!Operator::Store(StoreRepresentation {
            rep: MachineType::Word32,
            write_barrier: WriteBarrierKind::NoWriteBarrier,
        })
        .is_eliminatable());
    }

    #[test]
    fn test_display_includes_payload() {
        let load = Operator::LoadContext(ContextAccess::new(2, 5, true));
        assert_eq!(load.to_string(), "LoadContext[2, 5, immutable]");
        assert_eq!(Operator::Int32Constant(-3).to_string(), "Int32Constant[-3]");
        assert_eq!(Operator::Word32Equal.to_string(), "Word32Equal");
    }

    #[test]
    fn test_overflow_ops_have_two_values() {
        assert_eq!(Operator::Int32AddWithOverflow.outputs().value, 2);
        assert_eq!(Operator::Int32Add.outputs().value, 1);
    }
}
