//! Tree walk that enumerates and applies mutations.
//!
//! Mutation points are addressed by `(line, index)`: the index counts the
//! mutations produced on the walker's current line and restarts whenever the
//! walk enters a node on a different line. Children are visited before their
//! parent, so a node's own mutation is numbered after everything inside it.

use tracing::trace;

use crate::core::{Error, Result};
use crate::parser::{self, NodeId, SyntaxTree};

use super::context::MutationContext;
use super::mutant::MutantAddress;
use super::operator::{catalog, category_of, NewChild, Replacement};
use super::operators::assignment::{is_pure_annotation, is_whitelisted_dunder};

/// Node kinds that are never mutated, including everything below them.
const EXCLUDED_KINDS: &[&str] = &[
    "import_statement",
    "import_from_statement",
    "future_import_statement",
    "typed_parameter",
    "comment",
];

/// Parse the context's source, apply the mutation(s) it targets and render
/// the result.
///
/// Returns the mutated source and the number of mutations applied.
pub fn mutate(ctx: &mut MutationContext) -> Result<(String, usize)> {
    let path = ctx
        .filename
        .clone()
        .unwrap_or_else(|| "<source>".into());
    let mut tree = parser::parse(ctx.source(), &path)?;

    let root = tree.root();
    let top_level: Vec<NodeId> = tree.children(root).to_vec();
    for node in top_level {
        visit(&mut tree, node, ctx);
        if ctx.is_done() {
            break;
        }
    }

    let mut mutated = tree.render().replace(" not not ", " ");
    if ctx.remove_newline_at_end() {
        if !mutated.ends_with('\n') {
            return Err(Error::internal(format!(
                "rendered source of {} lost its final newline",
                path.display()
            )));
        }
        mutated.pop();
    }

    if !ctx.performed.is_empty() && mutated == ctx.original_source() {
        return Err(Error::internal(format!(
            "mutation context states that a mutation occurred in {} but the mutated source remains the same as original",
            path.display()
        )));
    }

    Ok((mutated, ctx.performed.len()))
}

/// Enumerate every mutation point of the context's source.
pub fn list_mutations(ctx: &mut MutationContext) -> Result<Vec<MutantAddress>> {
    if !ctx.target.is_all() {
        return Err(Error::internal("list_mutations requires an all-mutants context"));
    }
    mutate(ctx)?;
    Ok(std::mem::take(&mut ctx.performed))
}

fn visit(tree: &mut SyntaxTree, node: NodeId, ctx: &mut MutationContext) {
    ctx.stack.push(node);
    visit_node(tree, node, ctx);
    ctx.stack.pop();
}

fn visit_node(tree: &mut SyntaxTree, node: NodeId, ctx: &mut MutationContext) {
    if is_excluded(tree, node) {
        return;
    }

    let line_index = tree.start(node).line - 1;
    if line_index != ctx.current_line_index {
        ctx.current_line_index = line_index;
        ctx.index = 0;
    }

    if is_whitelisted_dunder(tree, node) || is_pure_annotation(tree, node) {
        return;
    }

    if !tree.is_leaf(node) {
        visit_children(tree, node, ctx);
        if ctx.is_done() {
            return;
        }
    }

    let Some(category) = category_of(tree, node) else {
        return;
    };
    let Some(operator) = catalog().get(category) else {
        return;
    };
    if ctx.exclude_line() {
        return;
    }

    let alternatives = operator.mutate(tree, node, ctx).into_alternatives();
    for replacement in alternatives.into_iter().rev() {
        if !replacement.is_noop(tree, node) {
            if let Some(hooks) = ctx.config.hooks.clone() {
                hooks.pre_mutation_ast(ctx);
            }
            if ctx.should_mutate(category) {
                let address = ctx.address_of_current_index();
                trace!(%address, %category, "applying mutation");
                ctx.performed.push(address);
                apply(tree, node, replacement);
            }
            ctx.index += 1;
        }
        if ctx.is_done() {
            return;
        }
    }
}

fn visit_children(tree: &mut SyntaxTree, node: NodeId, ctx: &mut MutationContext) {
    let is_function = tree.kind(node) == "function_definition";
    let children: Vec<NodeId> = tree.children(node).to_vec();
    for child in children {
        if is_function {
            match tree.value(child) {
                Some("->") => {
                    ctx.annotation_depth += 1;
                    continue;
                }
                Some(":") if ctx.annotation_depth > 0 => ctx.annotation_depth -= 1,
                _ if ctx.annotation_depth > 0 => continue,
                _ => {}
            }
        }

        visit(tree, child, ctx);
        if ctx.is_done() {
            return;
        }
    }
}

fn is_excluded(tree: &SyntaxTree, node: NodeId) -> bool {
    let kind = tree.kind(node);
    if EXCLUDED_KINDS.contains(&kind) {
        return true;
    }

    // Annotation and name of `arg: T = default`; the default stays mutable.
    if tree.parent(node).is_some_and(|p| tree.kind(p) == "typed_default_parameter")
        && matches!(tree.field(node), Some("name" | "type"))
    {
        return true;
    }

    // `__import__("module")`
    kind == "call"
        && tree
            .child_by_field(node, "function")
            .is_some_and(|f| tree.kind(f) == "identifier" && tree.value(f) == Some("__import__"))
}

fn apply(tree: &mut SyntaxTree, node: NodeId, replacement: Replacement) {
    match replacement {
        Replacement::Value(value) => tree.set_value(node, value),
        Replacement::Children(children) => {
            let at = tree.start(node);
            let ids = children
                .into_iter()
                .map(|child| match child {
                    NewChild::Existing(id) => id,
                    NewChild::Leaf { prefix, value } => tree.new_leaf("synthetic", prefix, value, at),
                })
                .collect();
            tree.set_children(node, ids);
        }
    }
}
