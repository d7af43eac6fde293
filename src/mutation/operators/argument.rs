//! Keyword-argument mutation for dict-like constructors.

use crate::parser::{NodeId, SyntaxTree};

use super::super::context::MutationContext;
use super::super::operator::{
    MutationCategory, MutationOperator, MutationOutcome, NewChild, Replacement,
};

/// Renames keyword arguments of `dict(...)` (and configured synonyms), which
/// are really dictionary keys.
pub struct ArgumentMutation;

impl MutationOperator for ArgumentMutation {
    fn category(&self) -> MutationCategory {
        MutationCategory::Argument
    }

    fn mutate(&self, tree: &SyntaxTree, node: NodeId, ctx: &MutationContext) -> MutationOutcome {
        let Some(callee) = ctx
            .ancestor(2)
            .filter(|&call| tree.kind(call) == "call")
            .and_then(|call| tree.child_by_field(call, "function"))
        else {
            return MutationOutcome::Ineligible;
        };
        let Some(callee_name) = tree.value(callee) else {
            return MutationOutcome::Ineligible;
        };
        if tree.kind(callee) != "identifier"
            || !ctx.dict_synonyms().iter().any(|name| name == callee_name)
        {
            return MutationOutcome::Ineligible;
        }

        let Some(name) = tree.child_by_field(node, "name") else {
            return MutationOutcome::Ineligible;
        };
        let children = tree
            .children(node)
            .iter()
            .map(|&child| {
                if child == name {
                    NewChild::leaf(
                        tree.leaf_prefix(name).unwrap_or_default(),
                        format!("{}XX", tree.value(name).unwrap_or_default()),
                    )
                } else {
                    NewChild::Existing(child)
                }
            })
            .collect();
        MutationOutcome::Single(Replacement::Children(children))
    }
}
