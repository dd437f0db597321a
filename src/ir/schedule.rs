// This module models the schedule that the instruction selector consumes: an assignment of
// graph nodes to basic blocks, each block ending in one control transfer (goto, branch,
// return, throw, deoptimize, or a call with continuation and deoptimization successors),
// plus the reverse post-order of the blocks. Building a schedule is the scheduler's job and
// happens upstream, so this module only offers the builder operations a scheduler (or the
// text IR parser and the tests) needs, and compute_rpo, which numbers the reachable blocks
// with an iterative depth-first walk and flags loop headers from the back edges it finds.
// Successor order matters: a branch lists its true then false target, and a call lists its
// deoptimization block before its continuation so the cold block lands late in the order.

//! Basic blocks and block order.

use std::fmt;

use hashbrown::HashMap;

use super::node::NodeId;
use super::operator::Operator;
use super::graph::Graph;
use crate::core::{CompileError, CompileResult};

/// Identifier of a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// How control leaves a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// No control transfer (the exit block).
    None,
    Goto,
    Branch,
    Return,
    Throw,
    Deoptimize,
    /// A call that may lazily deoptimize, with deoptimization and
    /// continuation successors.
    Call,
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    id: BlockId,
    nodes: Vec<NodeId>,
    control: ControlKind,
    control_input: Option<NodeId>,
    successors: Vec<BlockId>,
    predecessors: Vec<BlockId>,
    rpo_number: Option<usize>,
    loop_header: bool,
    deferred: bool,
}

impl BasicBlock {
    fn new(id: BlockId) -> Self {
        Self {
            id,
            nodes: Vec::new(),
            control: ControlKind::None,
            control_input: None,
            successors: Vec::new(),
            predecessors: Vec::new(),
            rpo_number: None,
            loop_header: false,
            deferred: false,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Nodes placed in this block, in program order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn control(&self) -> ControlKind {
        self.control
    }

    pub fn control_input(&self) -> Option<NodeId> {
        self.control_input
    }

    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    pub fn successor_at(&self, index: usize) -> CompileResult<BlockId> {
        self.successors.get(index).copied().ok_or_else(|| {
            CompileError::invariant(format!("{} has no successor {}", self.id, index))
        })
    }

    pub fn predecessor_count(&self) -> usize {
        self.predecessors.len()
    }

    pub fn rpo_number(&self) -> Option<usize> {
        self.rpo_number
    }

    pub fn is_loop_header(&self) -> bool {
        self.loop_header
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }
}

/// Blocks of one function and the node to block assignment.
#[derive(Debug, Clone)]
pub struct Schedule {
    blocks: Vec<BasicBlock>,
    node_to_block: HashMap<NodeId, BlockId>,
    rpo_order: Vec<BlockId>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

impl Schedule {
    /// A schedule holding only the entry block.
    pub fn new() -> Self {
        Self {
            blocks: vec![BasicBlock::new(BlockId(0))],
            node_to_block: HashMap::new(),
            rpo_order: Vec::new(),
        }
    }

    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id));
        id
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Block by id.
    ///
    /// Panics if `id` was not produced by this schedule.
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Block a node was placed in, if any.
    pub fn block_of(&self, node: NodeId) -> Option<BlockId> {
        self.node_to_block.get(&node).copied()
    }

    /// Reachable blocks in reverse post-order, valid after [`compute_rpo`].
    ///
    /// [`compute_rpo`]: Schedule::compute_rpo
    pub fn rpo_order(&self) -> &[BlockId] {
        &self.rpo_order
    }

    fn block_mut(&mut self, id: BlockId) -> CompileResult<&mut BasicBlock> {
        self.blocks
            .get_mut(id.index())
            .ok_or_else(|| CompileError::invariant(format!("{} is not part of the schedule", id)))
    }

    fn set_block_for_node(&mut self, block: BlockId, node: NodeId) -> CompileResult<()> {
        if let Some(previous) = self.node_to_block.insert(node, block) {
            if previous != block {
                return Err(CompileError::invariant(format!(
                    "{} is scheduled in both {} and {}",
                    node, previous, block
                )));
            }
        }
        Ok(())
    }

    /// Append `node` to `block`.
    pub fn add_node(&mut self, block: BlockId, node: NodeId) -> CompileResult<()> {
        self.set_block_for_node(block, node)?;
        self.block_mut(block)?.nodes.push(node);
        Ok(())
    }

    fn set_control(
        &mut self,
        block: BlockId,
        control: ControlKind,
        input: Option<NodeId>,
        successors: &[BlockId],
    ) -> CompileResult<()> {
        if let Some(node) = input {
            self.set_block_for_node(block, node)?;
        }
        for &succ in successors {
            self.block_mut(succ)?.predecessors.push(block);
        }
        let b = self.block_mut(block)?;
        if b.control != ControlKind::None {
            return Err(CompileError::invariant(format!("{} already ends in control", block)));
        }
        b.control = control;
        b.control_input = input;
        b.successors.extend_from_slice(successors);
        Ok(())
    }

    pub fn add_goto(&mut self, block: BlockId, target: BlockId) -> CompileResult<()> {
        self.set_control(block, ControlKind::Goto, None, &[target])
    }

    pub fn add_branch(
        &mut self,
        block: BlockId,
        branch: NodeId,
        tblock: BlockId,
        fblock: BlockId,
    ) -> CompileResult<()> {
        self.set_control(block, ControlKind::Branch, Some(branch), &[tblock, fblock])
    }

    pub fn add_return(&mut self, block: BlockId, input: NodeId) -> CompileResult<()> {
        self.set_control(block, ControlKind::Return, Some(input), &[])
    }

    pub fn add_throw(&mut self, block: BlockId, input: NodeId) -> CompileResult<()> {
        self.set_control(block, ControlKind::Throw, Some(input), &[])
    }

    pub fn add_deoptimize(&mut self, block: BlockId, input: NodeId) -> CompileResult<()> {
        self.set_control(block, ControlKind::Deoptimize, Some(input), &[])
    }

    /// End `block` with a call that continues in `cont_block` or lazily
    /// deoptimizes into `deopt_block`.
    pub fn add_call(
        &mut self,
        block: BlockId,
        call: NodeId,
        cont_block: BlockId,
        deopt_block: BlockId,
    ) -> CompileResult<()> {
        self.set_control(block, ControlKind::Call, Some(call), &[deopt_block, cont_block])
    }

    pub fn mark_deferred(&mut self, block: BlockId) -> CompileResult<()> {
        self.block_mut(block)?.deferred = true;
        Ok(())
    }

    /// Number the blocks reachable from the entry in reverse post-order and
    /// flag the targets of back edges as loop headers.
    pub fn compute_rpo(&mut self) {
        const UNVISITED: u8 = 0;
        const ON_STACK: u8 = 1;
        const DONE: u8 = 2;

        let mut state = vec![UNVISITED; self.blocks.len()];
        let mut post = Vec::with_capacity(self.blocks.len());
        let mut stack: Vec<(BlockId, usize)> = vec![(self.entry(), 0)];
        state[0] = ON_STACK;

        for block in &mut self.blocks {
            block.loop_header = false;
            block.rpo_number = None;
        }

        while let Some(top) = stack.last_mut() {
            let (block, next) = *top;
            top.1 += 1;
            match self.blocks[block.index()].successors.get(next).copied() {
                Some(succ) => match state[succ.index()] {
                    UNVISITED => {
                        state[succ.index()] = ON_STACK;
                        stack.push((succ, 0));
                    }
                    ON_STACK => self.blocks[succ.index()].loop_header = true,
                    _ => {}
                },
                None => {
                    state[block.index()] = DONE;
                    post.push(block);
                    stack.pop();
                }
            }
        }

        post.reverse();
        for (number, &block) in post.iter().enumerate() {
            self.blocks[block.index()].rpo_number = Some(number);
        }
        self.rpo_order = post;
    }

    /// Check the structural invariants the selector relies on.
    pub fn verify(&self, graph: &Graph) -> CompileResult<()> {
        for &id in &self.rpo_order {
            let block = self.block(id);
            if block.control == ControlKind::Branch {
                for &target in &block.successors {
                    let has_phi = self
                        .block(target)
                        .nodes
                        .iter()
                        .any(|&n| graph.op(n).is_phi());
                    if has_phi {
                        return Err(CompileError::BranchTargetHasPhi { block: target });
                    }
                }
            }
            if block.loop_header && block.predecessors.len() < 2 {
                return Err(CompileError::invariant(format!(
                    "loop header {} has {} predecessors",
                    id,
                    block.predecessors.len()
                )));
            }
            for &node in &block.nodes {
                graph.check(node)?;
                if matches!(graph.op(node), Operator::Dead) {
                    return Err(CompileError::invariant(format!("{} in {} is dead", node, id)));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpo_of_diamond_places_false_target_first() {
        let mut schedule = Schedule::new();
        let entry = schedule.entry();
        let then_block = schedule.new_block();
        let else_block = schedule.new_block();
        let mut graph = Graph::new();
        let start = graph.new_node(Operator::Start, &[]).unwrap();
        let c = graph.int32_constant(1);
        let branch = graph.new_node(Operator::Branch, &[c, start]).unwrap();
        schedule.add_branch(entry, branch, then_block, else_block).unwrap();
        schedule.compute_rpo();

        assert_eq!(schedule.rpo_order(), &[entry, else_block, then_block]);
        assert_eq!(schedule.block(then_block).rpo_number(), Some(2));
        assert_eq!(schedule.block_of(branch), Some(entry));
    }

    #[test]
    fn test_back_edge_marks_loop_header() {
        let mut schedule = Schedule::new();
        let entry = schedule.entry();
        let header = schedule.new_block();
        let body = schedule.new_block();
        let exit = schedule.new_block();
        let mut graph = Graph::new();
        let start = graph.new_node(Operator::Start, &[]).unwrap();
        let c = graph.int32_constant(1);
        let branch = graph.new_node(Operator::Branch, &[c, start]).unwrap();

        schedule.add_goto(entry, header).unwrap();
        schedule.add_branch(header, branch, body, exit).unwrap();
        schedule.add_goto(body, header).unwrap();
        schedule.compute_rpo();

        assert!(schedule.block(header).is_loop_header());
        assert!(!schedule.block(body).is_loop_header());
        assert_eq!(schedule.block(header).predecessor_count(), 2);
        assert_eq!(schedule.rpo_order().len(), 4);
        assert_eq!(schedule.rpo_order()[0], entry);
        assert_eq!(schedule.rpo_order()[1], header);
        schedule.verify(&graph).unwrap();
    }

    #[test]
    fn test_unreachable_blocks_have_no_rpo_number() {
        let mut schedule = Schedule::new();
        let orphan = schedule.new_block();
        schedule.compute_rpo();
        assert_eq!(schedule.block(orphan).rpo_number(), None);
        assert_eq!(schedule.rpo_order().len(), 1);
    }

    #[test]
    fn test_double_control_is_rejected() {
        let mut schedule = Schedule::new();
        let entry = schedule.entry();
        let next = schedule.new_block();
        schedule.add_goto(entry, next).unwrap();
        assert!(schedule.add_goto(entry, next).is_err());
    }
}
