//! Identifier mutation.

use crate::parser::{NodeId, SyntaxTree};

use super::super::context::MutationContext;
use super::super::operator::{MutationCategory, MutationOperator, MutationOutcome, Replacement};

/// Swaps well-known builtins and nulls out lone subscript/call arguments.
pub struct NameMutation;

const SWAPS: &[(&str, &str)] = &[
    ("deepcopy", "copy"),
    ("max", "min"),
    ("min", "max"),
    ("len", "sum"),
    ("sum", "len"),
    ("all", "any"),
    ("any", "all"),
    ("sorted", "reversed"),
    ("reversed", "sorted"),
    ("abs", "len"),
    ("map", "filter"),
    ("filter", "map"),
    ("range", "list"),
    ("list", "tuple"),
    ("tuple", "list"),
    ("dict", "list"),
    ("set", "list"),
    ("frozenset", "set"),
    ("str", "repr"),
    ("repr", "str"),
];

impl MutationOperator for NameMutation {
    fn category(&self) -> MutationCategory {
        MutationCategory::Name
    }

    fn mutate(&self, tree: &SyntaxTree, node: NodeId, _ctx: &MutationContext) -> MutationOutcome {
        let Some(value) = tree.value(node) else {
            return MutationOutcome::Ineligible;
        };

        let outcome = super::lookup(SWAPS, value);
        if outcome != MutationOutcome::Ineligible {
            return outcome;
        }

        if is_lone_subscript(tree, node) || is_lone_call_argument(tree, node) {
            return MutationOutcome::Single(Replacement::Value("None".to_string()));
        }

        MutationOutcome::Ineligible
    }
}

/// `name[node]`
fn is_lone_subscript(tree: &SyntaxTree, node: NodeId) -> bool {
    let Some(parent) = tree.parent(node) else {
        return false;
    };
    if tree.kind(parent) != "subscript" || tree.field(node) != Some("subscript") {
        return false;
    }
    let subscripts = tree
        .children(parent)
        .iter()
        .filter(|&&c| tree.field(c) == Some("subscript"))
        .count();
    let target = tree.child_by_field(parent, "value");
    subscripts == 1 && target.is_some_and(|t| tree.kind(t) == "identifier")
}

/// `name(node)`
fn is_lone_call_argument(tree: &SyntaxTree, node: NodeId) -> bool {
    let Some(arguments) = tree.parent(node) else {
        return false;
    };
    if tree.kind(arguments) != "argument_list" {
        return false;
    }
    let named_args = tree
        .children(arguments)
        .iter()
        .filter(|&&c| tree.is_named(c) && tree.kind(c) != "comment")
        .count();
    let Some(call) = tree.parent(arguments) else {
        return false;
    };
    let callee = tree.child_by_field(call, "function");
    named_args == 1
        && tree.kind(call) == "call"
        && callee.is_some_and(|c| tree.kind(c) == "identifier")
}
