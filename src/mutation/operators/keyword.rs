//! Keyword replacement.

use crate::parser::{NodeId, SyntaxTree};

use super::super::context::MutationContext;
use super::super::operator::{MutationCategory, MutationOperator, MutationOutcome};

/// Keyword mutation (`True`/`False`, `break`/`continue`, `not`, `is`, `in`).
pub struct KeywordMutation;

const KEYWORDS: &[(&str, &str)] = &[
    ("not", ""),
    ("is", "is not"),
    ("in", "not in"),
    ("break", "continue"),
    ("continue", "break"),
    ("True", "False"),
    ("False", "True"),
];

/// Parents in which `is`/`in` are part of a larger operator or a loop head.
const COMPOSITE_PARENTS: &[&str] = &["not in", "is not", "for_in_clause"];

impl MutationOperator for KeywordMutation {
    fn category(&self) -> MutationCategory {
        MutationCategory::Keyword
    }

    fn mutate(&self, tree: &SyntaxTree, node: NodeId, ctx: &MutationContext) -> MutationOutcome {
        let Some(value) = tree.value(node) else {
            return MutationOutcome::Ineligible;
        };

        if let Some(parent) = ctx.ancestor(1) {
            let parent_kind = tree.kind(parent);
            if matches!(value, "in" | "is") && COMPOSITE_PARENTS.contains(&parent_kind) {
                return MutationOutcome::Ineligible;
            }
            if parent_kind == "for_statement" {
                return MutationOutcome::Ineligible;
            }
        }

        super::lookup(KEYWORDS, value)
    }
}
