//! Operator token replacement.
//!
//! Arithmetic and bitwise operators are swapped with their usual
//! counterpart, comparisons are shifted by one boundary, and augmented
//! assignments produce two alternatives: the swapped operator and a plain
//! `=`.

use crate::parser::{NodeId, SyntaxTree};

use super::super::context::MutationContext;
use super::super::operator::{MutationCategory, MutationOperator, MutationOutcome, Replacement};

/// Operator token mutation.
pub struct OperatorMutation;

const SIMPLE: &[(&str, &str)] = &[
    ("+", "-"),
    ("-", "+"),
    ("*", "/"),
    ("/", "*"),
    ("//", "/"),
    ("%", "/"),
    ("<<", ">>"),
    (">>", "<<"),
    ("&", "|"),
    ("|", "&"),
    ("^", "&"),
    ("**", "*"),
    ("~", ""),
    ("~=", "="),
    ("<", "<="),
    ("<=", "<"),
    (">", ">="),
    (">=", ">"),
    ("==", "!="),
    ("!=", "=="),
    ("<>", "=="),
];

const AUGMENTED: &[(&str, &str)] = &[
    ("+=", "-="),
    ("-=", "+="),
    ("*=", "/="),
    ("/=", "*="),
    ("//=", "/="),
    ("%=", "/="),
    ("<<=", ">>="),
    (">>=", "<<="),
    ("&=", "|="),
    ("|=", "&="),
    ("^=", "&="),
    ("**=", "*="),
];

/// Parents in which `*` and `**` unpack or separate instead of computing.
const STAR_CONTEXTS: &[&str] = &[
    "list_splat",
    "dictionary_splat",
    "list_splat_pattern",
    "dictionary_splat_pattern",
    "keyword_separator",
    "parameters",
    "lambda_parameters",
    "argument_list",
    "wildcard_import",
];

impl MutationOperator for OperatorMutation {
    fn category(&self) -> MutationCategory {
        MutationCategory::Operator
    }

    fn mutate(&self, tree: &SyntaxTree, node: NodeId, _ctx: &MutationContext) -> MutationOutcome {
        let Some(value) = tree.value(node) else {
            return MutationOutcome::Ineligible;
        };

        if matches!(value, "*" | "**") {
            let parent_kind = tree.parent(node).map(|p| tree.kind(p));
            if parent_kind.is_some_and(|kind| STAR_CONTEXTS.contains(&kind)) {
                return MutationOutcome::Ineligible;
            }
        }

        if let Some((_, swapped)) = AUGMENTED.iter().find(|(from, _)| *from == value) {
            return MutationOutcome::Alternatives(vec![
                Replacement::Value((*swapped).to_string()),
                Replacement::Value("=".to_string()),
            ]);
        }

        super::lookup(SIMPLE, value)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{list, mutants};

    #[test]
    fn test_arithmetic() {
        assert_eq!(mutants("a + b\n"), vec!["a - b\n"]);
        assert_eq!(mutants("a // b\n"), vec!["a / b\n"]);
        assert_eq!(mutants("a ** b\n"), vec!["a * b\n"]);
        assert_eq!(mutants("a % b\n"), vec!["a / b\n"]);
    }

    #[test]
    fn test_comparison() {
        assert_eq!(mutants("x == y\n"), vec!["x != y\n"]);
        assert_eq!(mutants("x < y\n"), vec!["x <= y\n"]);
        assert_eq!(mutants("x >= y\n"), vec!["x > y\n"]);
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(mutants("a << b\n"), vec!["a >> b\n"]);
        assert_eq!(mutants("a ^ b\n"), vec!["a & b\n"]);
        assert_eq!(mutants("~a\n"), vec!["a\n"]);
    }

    #[test]
    fn test_augmented_assignment_alternatives() {
        let source = "x += y\n";
        let addresses = list(source);
        assert_eq!(addresses.len(), 2);
        let results = mutants(source);
        assert!(results.contains(&"x -= y\n".to_string()));
        assert!(results.contains(&"x = y\n".to_string()));
    }

    #[test]
    fn test_star_markers_are_not_mutated() {
        assert!(list("def f(*args, **kwargs):\n    pass\n").is_empty());
        assert!(list("def f(a, *, b):\n    pass\n").is_empty());
        assert!(list("f(*args, **kwargs)\n").is_empty());
        assert_eq!(mutants("first, *rest = items\n"), vec!["first, *rest = None\n"]);
        assert_eq!(mutants("a * b\n"), vec!["a / b\n"]);
    }
}
