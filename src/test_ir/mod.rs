//! Text IR (TIR) for writing compiler tests without a frontend.
//!
//! A `.tir` file describes heap objects, call targets and one or more
//! functions. Each function is a graph plus, optionally, a schedule:
//!
//! ```text
//! ; Comments start with a semicolon
//! object answer = number 42
//! object outer = context none 2
//! slot outer 1 = answer
//! callee helper(c, word32) -> word32
//!
//! function abs(c, word32) -> word32
//! %start = Start
//! %x = Parameter[0] %start
//! %zero = Int32Constant[0]
//! %lt = Int32LessThan %x %zero
//! %br = Branch %lt %start
//! %t = IfTrue %br
//! %f = IfFalse %br
//! %neg = Int32Sub %zero %x
//! %r1 = Return %neg %start %t
//! %r2 = Return %x %start %f
//! block entry: %x %zero %lt -> branch %br negative positive
//! block negative: %neg -> return %r1
//! block positive: -> return %r2
//! ```
//!
//! Inputs may name nodes defined further down, which is how loops are
//! written. Block lines are processed after the whole function is read; the
//! first block is the entry block.

pub mod parser;

use hashbrown::HashMap;
use std::rc::Rc;

use crate::core::{CompilationSession, CompileResult};
use crate::ir::{BlockId, Graph, Heap, HeapRef, NodeId, Schedule};
use crate::reduce::{
    specialize_to_context, CommonOperatorReducer, ContextSpecializer, GraphReducer,
    MachineOperatorReducer,
};
use crate::select::{CallDescriptor, InstructionSelector, InstructionSequence, Linkage, TargetFeatures};

pub use parser::parse_module;

/// Everything a `.tir` file declares.
#[derive(Debug)]
pub struct TirModule {
    pub heap: Heap,
    pub objects: HashMap<String, HeapRef>,
    pub callees: HashMap<String, Rc<CallDescriptor>>,
    pub functions: Vec<TirFunction>,
}

impl TirModule {
    pub fn function(&self, name: &str) -> Option<&TirFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut TirFunction> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn object(&self, name: &str) -> Option<HeapRef> {
        self.objects.get(name).copied()
    }
}

/// One function: its graph, incoming linkage and schedule.
#[derive(Debug)]
pub struct TirFunction {
    pub name: String,
    pub linkage: Linkage,
    pub graph: Graph,
    /// Empty unless the function has block lines.
    pub schedule: Schedule,
    pub scheduled: bool,
    pub nodes: HashMap<String, NodeId>,
    pub blocks: HashMap<String, BlockId>,
    /// Context parameter and the context to specialize it to.
    pub specialization: Option<(NodeId, HeapRef)>,
}

impl TirFunction {
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.nodes.get(name).copied()
    }

    pub fn block(&self, name: &str) -> Option<BlockId> {
        self.blocks.get(name).copied()
    }

    /// Specialize to the declared context, if any, then run the machine,
    /// common and context reducers to a fixed point.
    pub fn reduce<'a>(
        &mut self,
        heap: &'a Heap,
        session: &'a CompilationSession<'a>,
        max_attempts: usize,
    ) -> CompileResult<()> {
        session.set_current_function(&self.name);
        if let Some((parameter, context)) = self.specialization {
            specialize_to_context(&mut self.graph, heap, parameter, context)?;
        }
        let mut reducer = GraphReducer::new()
            .with_max_attempts(max_attempts)
            .with_session(session);
        reducer.add_reducer(ContextSpecializer::new(heap));
        reducer.add_reducer(MachineOperatorReducer::new());
        reducer.add_reducer(CommonOperatorReducer::new());
        reducer.reduce_graph(&mut self.graph)
    }

    /// Select instructions for the scheduled graph.
    pub fn select<'a>(
        &'a self,
        features: TargetFeatures,
        session: &'a CompilationSession<'a>,
    ) -> CompileResult<InstructionSequence> {
        session.set_current_function(&self.name);
        InstructionSelector::new(&self.graph, &self.schedule, &self.linkage, features, session)
            .select_instructions()
    }
}
