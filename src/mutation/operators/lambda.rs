//! Lambda body mutation.

use crate::parser::{NodeId, SyntaxTree};

use super::super::context::MutationContext;
use super::super::operator::{
    MutationCategory, MutationOperator, MutationOutcome, NewChild, Replacement,
};

/// Replaces a lambda's body with `None` (or `0` when it already is `None`).
pub struct LambdaMutation;

impl MutationOperator for LambdaMutation {
    fn category(&self) -> MutationCategory {
        MutationCategory::Lambdef
    }

    fn mutate(&self, tree: &SyntaxTree, node: NodeId, _ctx: &MutationContext) -> MutationOutcome {
        let Some(body) = tree.child_by_field(node, "body") else {
            return MutationOutcome::Ineligible;
        };
        let constant = if tree.text(body) == "None" { "0" } else { "None" };
        let children = tree
            .children(node)
            .iter()
            .map(|&child| {
                if child == body {
                    NewChild::leaf(" ", constant)
                } else {
                    NewChild::Existing(child)
                }
            })
            .collect();
        MutationOutcome::Single(Replacement::Children(children))
    }
}
