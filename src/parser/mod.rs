//! Tree-sitter based Python parser producing a lossless, mutable syntax tree.

mod tree;

pub use tree::{NodeId, Position, SyntaxNode, SyntaxTree};

use std::path::Path;

use tree_sitter::{Language as TsLanguage, Node, Parser as TsParser};

use crate::core::{Error, Result};

/// Get the tree-sitter grammar used for mutated sources.
pub fn python_language() -> TsLanguage {
    tree_sitter_python::LANGUAGE.into()
}

/// Parse Python source into a [`SyntaxTree`].
///
/// Any error or missing node in the tree-sitter parse is reported as a
/// fatal [`Error::Parse`]: mutating a partially understood file could produce
/// mutants that are attributed to the wrong line.
pub fn parse(source: &str, path: &Path) -> Result<SyntaxTree> {
    let mut parser = TsParser::new();
    parser
        .set_language(&python_language())
        .map_err(|e| Error::internal(format!("failed to load Python grammar: {e}")))?;

    let ts_tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::parse(path, "Failed to parse file"))?;

    let root = ts_tree.root_node();
    if root.has_error() {
        let message = match first_error(root) {
            Some(node) => format!(
                "invalid syntax at line {}, column {}",
                node.start_position().row + 1,
                node.start_position().column + 1
            ),
            None => "invalid syntax".to_string(),
        };
        return Err(Error::parse(path, message));
    }

    Ok(SyntaxTree::from_tree_sitter(root, source))
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error)
}
