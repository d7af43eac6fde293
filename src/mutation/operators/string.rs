//! String literal mutation.

use crate::parser::{NodeId, SyntaxTree};

use super::super::context::MutationContext;
use super::super::operator::{
    MutationCategory, MutationOperator, MutationOutcome, NewChild, Replacement,
};

const MARKER: &str = "XX";

/// Wraps the contents of string literals in `XX` markers.
pub struct StringMutation {
    formatted: bool,
}

impl StringMutation {
    /// Plain (and bytes) strings; triple-quoted ones are left alone.
    pub fn plain() -> Self {
        Self { formatted: false }
    }

    /// f-strings, including triple-quoted ones.
    pub fn formatted() -> Self {
        Self { formatted: true }
    }
}

/// Category of a string literal given its opening token (or full text).
pub fn string_category(opening: &str) -> MutationCategory {
    let (prefix, _) = split_prefix(opening);
    if prefix.contains(['f', 'F']) {
        MutationCategory::Fstring
    } else {
        MutationCategory::String
    }
}

fn split_prefix(text: &str) -> (&str, &str) {
    let quote = text.find(['"', '\'']).unwrap_or(text.len());
    text.split_at(quote)
}

fn is_triple_quoted(quotes: &str) -> bool {
    quotes.starts_with("\"\"\"") || quotes.starts_with("'''")
}

impl MutationOperator for StringMutation {
    fn category(&self) -> MutationCategory {
        if self.formatted {
            MutationCategory::Fstring
        } else {
            MutationCategory::String
        }
    }

    fn mutate(&self, tree: &SyntaxTree, node: NodeId, _ctx: &MutationContext) -> MutationOutcome {
        if let Some(literal) = tree.value(node) {
            return self.mutate_literal(literal);
        }

        let children = tree.children(node);
        let (Some(&start), Some(&end)) = (children.first(), children.last()) else {
            return MutationOutcome::Ineligible;
        };
        if children.len() < 2
            || tree.kind(start) != "string_start"
            || tree.kind(end) != "string_end"
        {
            return MutationOutcome::Ineligible;
        }

        let opening = tree.value(start).unwrap_or_default();
        let (_, quotes) = split_prefix(opening);
        if !self.formatted && is_triple_quoted(quotes) {
            return MutationOutcome::Ineligible;
        }

        let mut replaced: Vec<NewChild> = children.iter().map(|&c| NewChild::Existing(c)).collect();
        let last = replaced.len() - 1;
        replaced[0] = NewChild::leaf(
            tree.leaf_prefix(start).unwrap_or_default(),
            format!("{opening}{MARKER}"),
        );
        replaced[last] = NewChild::leaf(
            tree.leaf_prefix(end).unwrap_or_default(),
            format!("{MARKER}{}", tree.value(end).unwrap_or_default()),
        );
        MutationOutcome::Single(Replacement::Children(replaced))
    }
}

impl StringMutation {
    /// Mutate a string literal that the parser delivered as a single token.
    fn mutate_literal(&self, literal: &str) -> MutationOutcome {
        let (prefix, body) = split_prefix(literal);
        if body.len() < 2 || (!self.formatted && is_triple_quoted(body)) {
            return MutationOutcome::Ineligible;
        }
        let quote_len = if is_triple_quoted(body) { 3 } else { 1 };
        if body.len() < quote_len * 2 {
            return MutationOutcome::Ineligible;
        }
        let (open, rest) = body.split_at(quote_len);
        let (inner, close) = rest.split_at(rest.len() - quote_len);
        MutationOutcome::Single(Replacement::Value(format!(
            "{prefix}{open}{MARKER}{inner}{MARKER}{close}"
        )))
    }
}
