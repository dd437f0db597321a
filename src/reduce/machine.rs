//! Strength reduction and constant folding for 32-bit machine operators.
//!
//! Folded results come from the graph's constant cache, so a fold may be a
//! replacement by an old node (the constant already existed) or by a new
//! one. Commutative operators with a constant on the left are canonicalized
//! in place by swapping their inputs, which lets the instruction selector
//! rely on immediates sitting on the right.

use log::trace;

use super::{Reducer, Reduction};
use crate::core::CompileResult;
use crate::ir::{Graph, NodeId, Operator};

/// Operands of a binary node with their constant values, if known.
struct Int32Binop {
    left: NodeId,
    right: NodeId,
    left_value: Option<i32>,
    right_value: Option<i32>,
}

impl Int32Binop {
    fn new(graph: &Graph, node: NodeId) -> CompileResult<Self> {
        let left = graph.value_input(node, 0)?;
        let right = graph.value_input(node, 1)?;
        Ok(Self {
            left,
            right,
            left_value: int32_value(graph, left),
            right_value: int32_value(graph, right),
        })
    }

    fn right_is(&self, value: i32) -> bool {
        self.right_value == Some(value)
    }

    fn both(&self) -> Option<(i32, i32)> {
        Some((self.left_value?, self.right_value?))
    }
}

fn int32_value(graph: &Graph, node: NodeId) -> Option<i32> {
    match graph.op(node) {
        Operator::Int32Constant(v) => Some(*v),
        _ => None,
    }
}

fn is_commutative(op: &Operator) -> bool {
    matches!(
        op,
        Operator::Int32Add
            | Operator::Int32Mul
            | Operator::Word32And
            | Operator::Word32Or
            | Operator::Word32Xor
            | Operator::Word32Equal
    )
}

#[derive(Debug, Default)]
pub struct MachineOperatorReducer;

impl MachineOperatorReducer {
    pub fn new() -> Self {
        Self
    }

    fn replace_int32(graph: &mut Graph, value: i32) -> Reduction {
        Reduction::Replace(graph.int32_constant(value))
    }

    fn replace_bool(graph: &mut Graph, value: bool) -> Reduction {
        Self::replace_int32(graph, value as i32)
    }
}

impl Reducer for MachineOperatorReducer {
    fn name(&self) -> &'static str {
        "machine"
    }

    fn reduce(&mut self, graph: &mut Graph, node: NodeId) -> CompileResult<Reduction> {
        let op = graph.op(node).clone();
        let is_binop = matches!(
            op,
            Operator::Int32Add
                | Operator::Int32Sub
                | Operator::Int32Mul
                | Operator::Int32Div
                | Operator::Int32Mod
                | Operator::Word32And
                | Operator::Word32Or
                | Operator::Word32Xor
                | Operator::Word32Shl
                | Operator::Word32Shr
                | Operator::Word32Sar
                | Operator::Word32Equal
                | Operator::Int32LessThan
                | Operator::Int32LessThanOrEqual
                | Operator::Uint32LessThan
                | Operator::Uint32LessThanOrEqual
        );
        if !is_binop {
            return Ok(Reduction::NoChange);
        }

        let m = Int32Binop::new(graph, node)?;

        if is_commutative(&op) && m.left_value.is_some() && m.right_value.is_none() {
            trace!("machine: moving constant operand of {} to the right", node);
            graph.replace_input(node, 0, m.right)?;
            graph.replace_input(node, 1, m.left)?;
            return Ok(Reduction::InPlace);
        }

        let reduction = match op {
            Operator::Int32Add => {
                if m.right_is(0) {
                    Reduction::Replace(m.left)
                } else if let Some((a, b)) = m.both() {
                    Self::replace_int32(graph, a.wrapping_add(b))
                } else {
                    Reduction::NoChange
                }
            }
            Operator::Int32Sub => {
                if m.right_is(0) {
                    Reduction::Replace(m.left)
                } else if let Some((a, b)) = m.both() {
                    Self::replace_int32(graph, a.wrapping_sub(b))
                } else if m.left == m.right {
                    Self::replace_int32(graph, 0)
                } else {
                    Reduction::NoChange
                }
            }
            Operator::Int32Mul => {
                if m.right_is(1) {
                    Reduction::Replace(m.left)
                } else if m.right_is(0) {
                    Reduction::Replace(m.right)
                } else if let Some((a, b)) = m.both() {
                    Self::replace_int32(graph, a.wrapping_mul(b))
                } else {
                    Reduction::NoChange
                }
            }
            Operator::Int32Div => {
                if m.right_is(1) {
                    Reduction::Replace(m.left)
                } else {
                    match m.both() {
                        Some((a, b)) if b != 0 && !(a == i32::MIN && b == -1) => {
                            Self::replace_int32(graph, a / b)
                        }
                        _ => Reduction::NoChange,
                    }
                }
            }
            Operator::Int32Mod => match m.both() {
                Some((a, b)) if b != 0 && !(a == i32::MIN && b == -1) => {
                    Self::replace_int32(graph, a % b)
                }
                _ => Reduction::NoChange,
            },
            Operator::Word32And => {
                if m.right_is(0) {
                    Reduction::Replace(m.right)
                } else if m.right_is(-1) || m.left == m.right {
                    Reduction::Replace(m.left)
                } else if let Some((a, b)) = m.both() {
                    Self::replace_int32(graph, a & b)
                } else {
                    Reduction::NoChange
                }
            }
            Operator::Word32Or => {
                if m.right_is(0) || m.left == m.right {
                    Reduction::Replace(m.left)
                } else if m.right_is(-1) {
                    Reduction::Replace(m.right)
                } else if let Some((a, b)) = m.both() {
                    Self::replace_int32(graph, a | b)
                } else {
                    Reduction::NoChange
                }
            }
            Operator::Word32Xor => {
                if m.right_is(0) {
                    Reduction::Replace(m.left)
                } else if m.left == m.right {
                    Self::replace_int32(graph, 0)
                } else if let Some((a, b)) = m.both() {
                    Self::replace_int32(graph, a ^ b)
                } else {
                    Reduction::NoChange
                }
            }
            Operator::Word32Shl | Operator::Word32Shr | Operator::Word32Sar => {
                if m.right_value.map(|s| s & 0x1f) == Some(0) {
                    Reduction::Replace(m.left)
                } else if let Some((a, b)) = m.both() {
                    let shift = (b & 0x1f) as u32;
                    let value = match op {
                        Operator::Word32Shl => a.wrapping_shl(shift),
                        Operator::Word32Shr => ((a as u32) >> shift) as i32,
                        _ => a >> shift,
                    };
                    Self::replace_int32(graph, value)
                } else {
                    Reduction::NoChange
                }
            }
            Operator::Word32Equal => {
                if let Some((a, b)) = m.both() {
                    Self::replace_bool(graph, a == b)
                } else if m.left == m.right {
                    Self::replace_bool(graph, true)
                } else {
                    Reduction::NoChange
                }
            }
            Operator::Int32LessThan => match m.both() {
                Some((a, b)) => Self::replace_bool(graph, a < b),
                None if m.left == m.right => Self::replace_bool(graph, false),
                None => Reduction::NoChange,
            },
            Operator::Int32LessThanOrEqual => match m.both() {
                Some((a, b)) => Self::replace_bool(graph, a <= b),
                None if m.left == m.right => Self::replace_bool(graph, true),
                None => Reduction::NoChange,
            },
            Operator::Uint32LessThan => match m.both() {
                Some((a, b)) => Self::replace_bool(graph, (a as u32) < (b as u32)),
                None if m.left == m.right => Self::replace_bool(graph, false),
                None => Reduction::NoChange,
            },
            Operator::Uint32LessThanOrEqual => match m.both() {
                Some((a, b)) => Self::replace_bool(graph, (a as u32) <= (b as u32)),
                None if m.left == m.right => Self::replace_bool(graph, true),
                None => Reduction::NoChange,
            },
            _ => Reduction::NoChange,
        };
        Ok(reduction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(graph: &mut Graph, index: u32) -> NodeId {
        let start = match graph.start() {
            Some(start) => start,
            None => {
                let start = graph.new_node(Operator::Start, &[]).unwrap();
                graph.set_start(start);
                start
            }
        };
        graph.new_node(Operator::Parameter(index), &[start]).unwrap()
    }

    #[test]
    fn test_add_zero_is_identity() {
        let mut graph = Graph::new();
        let x = param(&mut graph, 0);
        let zero = graph.int32_constant(0);
        let add = graph.new_node(Operator::Int32Add, &[x, zero]).unwrap();
        let r = MachineOperatorReducer.reduce(&mut graph, add).unwrap();
        assert_eq!(r, Reduction::Replace(x));
    }

    #[test]
    fn test_constant_moves_right() {
        let mut graph = Graph::new();
        let x = param(&mut graph, 0);
        let three = graph.int32_constant(3);
        let add = graph.new_node(Operator::Int32Add, &[three, x]).unwrap();
        let r = MachineOperatorReducer.reduce(&mut graph, add).unwrap();
        assert_eq!(r, Reduction::InPlace);
        assert_eq!(graph.inputs(add), &[x, three]);
    }

    #[test]
    fn test_folds_constants() {
        let mut graph = Graph::new();
        let a = graph.int32_constant(6);
        let b = graph.int32_constant(7);
        let mul = graph.new_node(Operator::Int32Mul, &[a, b]).unwrap();
        let Reduction::Replace(folded) = MachineOperatorReducer.reduce(&mut graph, mul).unwrap() else {
            panic!("expected a replacement");
        };
        assert_eq!(*graph.op(folded), Operator::Int32Constant(42));

        let minus_one = graph.int32_constant(-1);
        let lt = graph.new_node(Operator::Uint32LessThan, &[a, minus_one]).unwrap();
        let Reduction::Replace(folded) = MachineOperatorReducer.reduce(&mut graph, lt).unwrap() else {
            panic!("expected a replacement");
        };
        assert_eq!(*graph.op(folded), Operator::Int32Constant(1));
    }

    #[test]
    fn test_division_by_zero_is_left_alone() {
        let mut graph = Graph::new();
        let a = graph.int32_constant(6);
        let zero = graph.int32_constant(0);
        let div = graph.new_node(Operator::Int32Div, &[a, zero]).unwrap();
        assert_eq!(MachineOperatorReducer.reduce(&mut graph, div).unwrap(), Reduction::NoChange);
    }
}
