//! Condition codes and flags continuations.
//!
//! A comparison sets the processor flags; the [`FlagsContinuation`] says who
//! reads them: a conditional branch, a materialized boolean, a deoptimization
//! guard, or nobody.

use std::fmt;

use crate::ir::{BlockId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagsCondition {
    Equal,
    NotEqual,
    SignedLessThan,
    SignedGreaterThanOrEqual,
    SignedLessThanOrEqual,
    SignedGreaterThan,
    UnsignedLessThan,
    UnsignedGreaterThanOrEqual,
    UnsignedLessThanOrEqual,
    UnsignedGreaterThan,
    UnorderedEqual,
    UnorderedNotEqual,
    UnorderedLessThan,
    UnorderedGreaterThanOrEqual,
    UnorderedLessThanOrEqual,
    UnorderedGreaterThan,
    Overflow,
    NotOverflow,
}

impl FlagsCondition {
    /// The condition that holds exactly when `self` does not.
    pub fn negate(self) -> Self {
        use FlagsCondition::*;
        match self {
            Equal => NotEqual,
            NotEqual => Equal,
            SignedLessThan => SignedGreaterThanOrEqual,
            SignedGreaterThanOrEqual => SignedLessThan,
            SignedLessThanOrEqual => SignedGreaterThan,
            SignedGreaterThan => SignedLessThanOrEqual,
            UnsignedLessThan => UnsignedGreaterThanOrEqual,
            UnsignedGreaterThanOrEqual => UnsignedLessThan,
            UnsignedLessThanOrEqual => UnsignedGreaterThan,
            UnsignedGreaterThan => UnsignedLessThanOrEqual,
            UnorderedEqual => UnorderedNotEqual,
            UnorderedNotEqual => UnorderedEqual,
            UnorderedLessThan => UnorderedGreaterThanOrEqual,
            UnorderedGreaterThanOrEqual => UnorderedLessThan,
            UnorderedLessThanOrEqual => UnorderedGreaterThan,
            UnorderedGreaterThan => UnorderedLessThanOrEqual,
            Overflow => NotOverflow,
            NotOverflow => Overflow,
        }
    }

    /// The condition to test after swapping the compared operands.
    pub fn commute(self) -> Self {
        use FlagsCondition::*;
        match self {
            SignedLessThan => SignedGreaterThan,
            SignedGreaterThanOrEqual => SignedLessThanOrEqual,
            SignedLessThanOrEqual => SignedGreaterThanOrEqual,
            SignedGreaterThan => SignedLessThan,
            UnsignedLessThan => UnsignedGreaterThan,
            UnsignedGreaterThanOrEqual => UnsignedLessThanOrEqual,
            UnsignedLessThanOrEqual => UnsignedGreaterThanOrEqual,
            UnsignedGreaterThan => UnsignedLessThan,
            UnorderedLessThan => UnorderedGreaterThan,
            UnorderedGreaterThanOrEqual => UnorderedLessThanOrEqual,
            UnorderedLessThanOrEqual => UnorderedGreaterThanOrEqual,
            UnorderedGreaterThan => UnorderedLessThan,
            Equal | NotEqual | UnorderedEqual | UnorderedNotEqual | Overflow | NotOverflow => self,
        }
    }

    pub fn name(self) -> &'static str {
        use FlagsCondition::*;
        match self {
            Equal => "equal",
            NotEqual => "not equal",
            SignedLessThan => "signed less than",
            SignedGreaterThanOrEqual => "signed greater than or equal",
            SignedLessThanOrEqual => "signed less than or equal",
            SignedGreaterThan => "signed greater than",
            UnsignedLessThan => "unsigned less than",
            UnsignedGreaterThanOrEqual => "unsigned greater than or equal",
            UnsignedLessThanOrEqual => "unsigned less than or equal",
            UnsignedGreaterThan => "unsigned greater than",
            UnorderedEqual => "unordered equal",
            UnorderedNotEqual => "unordered not equal",
            UnorderedLessThan => "unordered less than",
            UnorderedGreaterThanOrEqual => "unordered greater than or equal",
            UnorderedLessThanOrEqual => "unordered less than or equal",
            UnorderedGreaterThan => "unordered greater than",
            Overflow => "overflow",
            NotOverflow => "not overflow",
        }
    }
}

impl fmt::Display for FlagsCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an instruction's flags output is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagsMode {
    None,
    Branch,
    Set,
    Deoptimize,
}

/// Consumer of the flags a comparison produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlagsContinuation {
    /// Flags are not read.
    None,
    /// Jump to `true_block` when `condition` holds, else to `false_block`.
    Branch {
        condition: FlagsCondition,
        true_block: BlockId,
        false_block: BlockId,
    },
    /// Materialize `condition` as 0/1 in the value of `result`.
    Set {
        condition: FlagsCondition,
        result: NodeId,
    },
    /// Bail out with `frame_state` when `condition` holds.
    Deoptimize {
        condition: FlagsCondition,
        frame_state: NodeId,
    },
}

impl FlagsContinuation {
    pub fn branch(condition: FlagsCondition, true_block: BlockId, false_block: BlockId) -> Self {
        FlagsContinuation::Branch {
            condition,
            true_block,
            false_block,
        }
    }

    pub fn set(condition: FlagsCondition, result: NodeId) -> Self {
        FlagsContinuation::Set { condition, result }
    }

    pub fn deoptimize(condition: FlagsCondition, frame_state: NodeId) -> Self {
        FlagsContinuation::Deoptimize {
            condition,
            frame_state,
        }
    }

    pub fn mode(&self) -> FlagsMode {
        match self {
            FlagsContinuation::None => FlagsMode::None,
            FlagsContinuation::Branch { .. } => FlagsMode::Branch,
            FlagsContinuation::Set { .. } => FlagsMode::Set,
            FlagsContinuation::Deoptimize { .. } => FlagsMode::Deoptimize,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, FlagsContinuation::Branch { .. })
    }

    pub fn is_set(&self) -> bool {
        matches!(self, FlagsContinuation::Set { .. })
    }

    pub fn condition(&self) -> Option<FlagsCondition> {
        match *self {
            FlagsContinuation::None => None,
            FlagsContinuation::Branch { condition, .. }
            | FlagsContinuation::Set { condition, .. }
            | FlagsContinuation::Deoptimize { condition, .. } => Some(condition),
        }
    }

    fn condition_mut(&mut self) -> Option<&mut FlagsCondition> {
        match self {
            FlagsContinuation::None => None,
            FlagsContinuation::Branch { condition, .. }
            | FlagsContinuation::Set { condition, .. }
            | FlagsContinuation::Deoptimize { condition, .. } => Some(condition),
        }
    }

    pub fn negate(&mut self) {
        if let Some(condition) = self.condition_mut() {
            *condition = condition.negate();
        }
    }

    pub fn commute(&mut self) {
        if let Some(condition) = self.condition_mut() {
            *condition = condition.commute();
        }
    }

    /// Exchange the branch targets. Only meaningful for branches.
    pub fn swap_blocks(&mut self) {
        if let FlagsContinuation::Branch {
            true_block,
            false_block,
            ..
        } = self
        {
            std::mem::swap(true_block, false_block);
        }
    }

    /// Replace the condition with `condition`, negated if the current one
    /// is `Equal`. A continuation built for "value != 0" that was flipped to
    /// "value == 0" by folding a compare against zero keeps that inversion.
    pub fn overwrite_and_negate_if_equal(&mut self, condition: FlagsCondition) {
        if let Some(current) = self.condition_mut() {
            let negate = *current == FlagsCondition::Equal;
            *current = condition;
            if negate {
                *current = current.negate();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negate_is_an_involution() {
        use FlagsCondition::*;
        for c in [
            Equal,
            SignedLessThan,
            UnsignedGreaterThan,
            UnorderedLessThanOrEqual,
            Overflow,
        ] {
            assert_ne!(c.negate(), c);
            assert_eq!(c.negate().negate(), c);
        }
    }

    #[test]
    fn test_commute_swaps_direction() {
        assert_eq!(
            FlagsCondition::SignedLessThan.commute(),
            FlagsCondition::SignedGreaterThan
        );
        assert_eq!(FlagsCondition::Equal.commute(), FlagsCondition::Equal);
    }

    #[test]
    fn test_overwrite_keeps_inversion() {
        let mut cont = FlagsContinuation::branch(FlagsCondition::NotEqual, BlockId::new(1), BlockId::new(2));
        cont.overwrite_and_negate_if_equal(FlagsCondition::SignedLessThan);
        assert_eq!(cont.condition(), Some(FlagsCondition::SignedLessThan));

        cont.overwrite_and_negate_if_equal(FlagsCondition::Equal);
        cont.negate();
        assert_eq!(cont.condition(), Some(FlagsCondition::NotEqual));
        cont.overwrite_and_negate_if_equal(FlagsCondition::Equal);
        assert_eq!(cont.condition(), Some(FlagsCondition::Equal));

        let mut flipped = FlagsContinuation::branch(FlagsCondition::Equal, BlockId::new(1), BlockId::new(2));
        flipped.overwrite_and_negate_if_equal(FlagsCondition::SignedLessThan);
        assert_eq!(flipped.condition(), Some(FlagsCondition::SignedGreaterThanOrEqual));
    }

    #[test]
    fn test_swap_blocks() {
        let mut cont = FlagsContinuation::branch(FlagsCondition::Equal, BlockId::new(1), BlockId::new(2));
        cont.swap_blocks();
        assert_eq!(
            cont,
            FlagsContinuation::branch(FlagsCondition::Equal, BlockId::new(2), BlockId::new(1))
        );
    }
}
