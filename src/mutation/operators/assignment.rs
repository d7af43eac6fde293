//! Assignment value mutation.

use crate::parser::{NodeId, SyntaxTree};

use super::super::context::MutationContext;
use super::super::operator::{
    MutationCategory, MutationOperator, MutationOutcome, NewChild, Replacement,
};

/// Module metadata names (`__version__` etc.) whose values are never mutated.
pub const DUNDER_WHITELIST: &[&str] = &[
    "all",
    "version",
    "title",
    "package_name",
    "author",
    "description",
    "email",
    "license",
    "copyright",
];

/// Replaces the assigned value with `None` (or `""` when it already is `None`).
pub struct AssignmentMutation {
    annotated: bool,
}

impl AssignmentMutation {
    /// `x = value`
    pub fn expr_stmt() -> Self {
        Self { annotated: false }
    }

    /// `x: T = value`
    pub fn annassign() -> Self {
        Self { annotated: true }
    }
}

impl MutationOperator for AssignmentMutation {
    fn category(&self) -> MutationCategory {
        if self.annotated {
            MutationCategory::Annassign
        } else {
            MutationCategory::ExprStmt
        }
    }

    fn mutate(&self, tree: &SyntaxTree, node: NodeId, _ctx: &MutationContext) -> MutationOutcome {
        let Some(value) = tree.child_by_field(node, "right") else {
            return MutationOutcome::Ineligible;
        };
        // `a = b = c`: the inner assignment carries the mutation.
        if tree.kind(value) == "assignment" {
            return MutationOutcome::Ineligible;
        }
        let constant = if tree.text(value) == "None" { "\"\"" } else { "None" };
        let children = tree
            .children(node)
            .iter()
            .map(|&child| {
                if child == value {
                    NewChild::leaf(" ", constant)
                } else {
                    NewChild::Existing(child)
                }
            })
            .collect();
        MutationOutcome::Single(Replacement::Children(children))
    }
}

/// `x: int`, an annotation without a value.
pub fn is_pure_annotation(tree: &SyntaxTree, node: NodeId) -> bool {
    tree.kind(node) == "assignment" && tree.child_by_field(node, "right").is_none()
}

/// Assignment to a whitelisted module dunder such as `__version__`.
pub fn is_whitelisted_dunder(tree: &SyntaxTree, node: NodeId) -> bool {
    if tree.kind(node) != "assignment" {
        return false;
    }
    let Some(name) = tree
        .child_by_field(node, "left")
        .filter(|&left| tree.kind(left) == "identifier")
        .and_then(|left| tree.value(left))
    else {
        return false;
    };
    name.len() > 4
        && name
            .strip_prefix("__")
            .and_then(|rest| rest.strip_suffix("__"))
            .is_some_and(|inner| DUNDER_WHITELIST.contains(&inner))
}
