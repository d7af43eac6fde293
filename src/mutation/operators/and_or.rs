//! Boolean connective mutation.

use crate::parser::{NodeId, SyntaxTree};

use super::super::context::MutationContext;
use super::super::operator::{
    MutationCategory, MutationOperator, MutationOutcome, NewChild, Replacement,
};

/// Swaps `and` with `or` in a boolean operation.
pub struct AndOrMutation {
    category: MutationCategory,
}

impl AndOrMutation {
    pub fn or_test() -> Self {
        Self {
            category: MutationCategory::OrTest,
        }
    }

    pub fn and_test() -> Self {
        Self {
            category: MutationCategory::AndTest,
        }
    }
}

impl MutationOperator for AndOrMutation {
    fn category(&self) -> MutationCategory {
        self.category
    }

    fn mutate(&self, tree: &SyntaxTree, node: NodeId, _ctx: &MutationContext) -> MutationOutcome {
        let Some(operator) = tree.child_by_field(node, "operator") else {
            return MutationOutcome::Ineligible;
        };
        let swapped = match tree.value(operator) {
            Some("and") => "or",
            Some("or") => "and",
            _ => return MutationOutcome::Ineligible,
        };
        let children = tree
            .children(node)
            .iter()
            .map(|&child| {
                if child == operator {
                    NewChild::leaf(tree.leaf_prefix(operator).unwrap_or_default(), swapped)
                } else {
                    NewChild::Existing(child)
                }
            })
            .collect();
        MutationOutcome::Single(Replacement::Children(children))
    }
}
