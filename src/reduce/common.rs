//! Redundant phi elimination.

use super::{Reducer, Reduction};
use crate::core::CompileResult;
use crate::ir::{Graph, NodeId, Operator};

/// Replaces a phi (or effect phi) whose merged inputs are all the same node
/// by that node.
#[derive(Debug, Default)]
pub struct CommonOperatorReducer;

impl CommonOperatorReducer {
    pub fn new() -> Self {
        Self
    }
}

impl Reducer for CommonOperatorReducer {
    fn name(&self) -> &'static str {
        "common"
    }

    fn reduce(&mut self, graph: &mut Graph, node: NodeId) -> CompileResult<Reduction> {
        let count = match graph.op(node) {
            Operator::Phi(n) | Operator::EffectPhi(n) => *n as usize,
            _ => return Ok(Reduction::NoChange),
        };
        let inputs = graph.inputs(node);
        let merged = &inputs[..count.min(inputs.len())];
        // A phi that only merges itself with one other value is that value.
        let mut candidate = None;
        for &input in merged {
            if input == node || Some(input) == candidate {
                continue;
            }
            if candidate.is_some() {
                return Ok(Reduction::NoChange);
            }
            candidate = Some(input);
        }
        Ok(match candidate {
            Some(value) => Reduction::Replace(value),
            None => Reduction::NoChange,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phi_of_one_value_is_that_value() {
        let mut graph = Graph::new();
        let start = graph.new_node(Operator::Start, &[]).unwrap();
        let merge = graph.new_node(Operator::Merge(2), &[start, start]).unwrap();
        let x = graph.int32_constant(3);
        let phi = graph.new_node(Operator::Phi(2), &[x, x, merge]).unwrap();
        assert_eq!(CommonOperatorReducer.reduce(&mut graph, phi).unwrap(), Reduction::Replace(x));
    }

    #[test]
    fn test_phi_of_distinct_values_stays() {
        let mut graph = Graph::new();
        let start = graph.new_node(Operator::Start, &[]).unwrap();
        let merge = graph.new_node(Operator::Merge(2), &[start, start]).unwrap();
        let x = graph.int32_constant(3);
        let y = graph.int32_constant(4);
        let phi = graph.new_node(Operator::Phi(2), &[x, y, merge]).unwrap();
        assert_eq!(CommonOperatorReducer.reduce(&mut graph, phi).unwrap(), Reduction::NoChange);
    }
}
