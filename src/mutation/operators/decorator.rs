//! Decorator removal.

use crate::parser::{NodeId, SyntaxTree};

use super::super::context::MutationContext;
use super::super::operator::{
    MutationCategory, MutationOperator, MutationOutcome, NewChild, Replacement,
};

/// Removes a decorator, leaving its (now blank) line in place so that line
/// numbers below it do not shift.
pub struct DecoratorMutation;

impl MutationOperator for DecoratorMutation {
    fn category(&self) -> MutationCategory {
        MutationCategory::Decorator
    }

    fn mutate(&self, tree: &SyntaxTree, node: NodeId, _ctx: &MutationContext) -> MutationOutcome {
        if tree.children(node).is_empty() {
            return MutationOutcome::Ineligible;
        }
        let mut children = vec![NewChild::leaf(tree.prefix(node), "")];
        children.extend(
            tree.children(node)
                .iter()
                .filter(|&&child| tree.kind(child) == "comment")
                .map(|&child| NewChild::Existing(child)),
        );
        MutationOutcome::Single(Replacement::Children(children))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::mutants;

    #[test]
    fn test_decorator_is_removed() {
        let source = "@decorator\ndef f():\n    pass\n";
        assert_eq!(mutants(source), vec!["\ndef f():\n    pass\n"]);
    }

    #[test]
    fn test_indented_decorator_keeps_line() {
        let source = "class A:\n    @property\n    def f(self):\n        pass\n";
        assert_eq!(
            mutants(source),
            vec!["class A:\n    \n    def f(self):\n        pass\n"]
        );
    }
}
