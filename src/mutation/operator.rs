//! Mutation operator trait and registry.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::parser::{NodeId, SyntaxTree};

use super::context::MutationContext;
use super::operators;

/// Syntactic category a mutation operator is registered for.
///
/// The string names are the ones accepted by `--enable-mutation-types` and
/// `--disable-mutation-types`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationCategory {
    Operator,
    Keyword,
    Number,
    Name,
    String,
    Fstring,
    Argument,
    OrTest,
    AndTest,
    Lambdef,
    ExprStmt,
    Decorator,
    Annassign,
}

impl MutationCategory {
    pub const ALL: [MutationCategory; 13] = [
        Self::Operator,
        Self::Keyword,
        Self::Number,
        Self::Name,
        Self::String,
        Self::Fstring,
        Self::Argument,
        Self::OrTest,
        Self::AndTest,
        Self::Lambdef,
        Self::ExprStmt,
        Self::Decorator,
        Self::Annassign,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::Keyword => "keyword",
            Self::Number => "number",
            Self::Name => "name",
            Self::String => "string",
            Self::Fstring => "fstring",
            Self::Argument => "argument",
            Self::OrTest => "or_test",
            Self::AndTest => "and_test",
            Self::Lambdef => "lambdef",
            Self::ExprStmt => "expr_stmt",
            Self::Decorator => "decorator",
            Self::Annassign => "annassign",
        }
    }
}

impl fmt::Display for MutationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == name)
            .ok_or_else(|| {
                format!(
                    "The following are not valid mutation types: {name}. Valid mutation types are: {}",
                    Self::ALL.map(|c| c.as_str()).join(", ")
                )
            })
    }
}

/// A new child produced by a structural mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewChild {
    /// Keep an existing node in place.
    Existing(NodeId),
    /// Insert a synthetic token.
    Leaf { prefix: String, value: String },
}

impl NewChild {
    pub fn leaf(prefix: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Leaf {
            prefix: prefix.into(),
            value: value.into(),
        }
    }
}

/// Replacement for a node's token text or its child list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    Value(String),
    Children(Vec<NewChild>),
}

impl Replacement {
    /// Whether applying this replacement would leave the node unchanged.
    pub fn is_noop(&self, tree: &SyntaxTree, node: NodeId) -> bool {
        match self {
            Self::Value(value) => tree.value(node) == Some(value.as_str()),
            Self::Children(children) => {
                let current = tree.children(node);
                children.len() == current.len()
                    && children
                        .iter()
                        .zip(current)
                        .all(|(new, old)| *new == NewChild::Existing(*old))
            }
        }
    }
}

/// What an operator produced for a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The node cannot be mutated in this context.
    Ineligible,
    Single(Replacement),
    /// Several plausible mutations; the first one is the primary.
    Alternatives(Vec<Replacement>),
}

impl MutationOutcome {
    pub fn into_alternatives(self) -> Vec<Replacement> {
        match self {
            Self::Ineligible => Vec::new(),
            Self::Single(replacement) => vec![replacement],
            Self::Alternatives(replacements) => replacements,
        }
    }
}

/// Trait for mutation operators.
///
/// An operator is a pure rewrite rule for one syntactic category. It reads
/// the node (and, through the context, its ancestors) and proposes
/// replacements; the walker decides whether they are applied.
pub trait MutationOperator: Send + Sync {
    /// Category this operator handles.
    fn category(&self) -> MutationCategory;

    /// Propose replacements for `node`.
    fn mutate(&self, tree: &SyntaxTree, node: NodeId, ctx: &MutationContext) -> MutationOutcome;
}

/// Registry mapping each category to its operator.
pub struct OperatorRegistry {
    operators: HashMap<MutationCategory, Box<dyn MutationOperator>>,
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(operators::symbol::OperatorMutation));
        registry.register(Box::new(operators::keyword::KeywordMutation));
        registry.register(Box::new(operators::number::NumberMutation));
        registry.register(Box::new(operators::string::StringMutation::plain()));
        registry.register(Box::new(operators::string::StringMutation::formatted()));
        registry.register(Box::new(operators::name::NameMutation));
        registry.register(Box::new(operators::argument::ArgumentMutation));
        registry.register(Box::new(operators::and_or::AndOrMutation::or_test()));
        registry.register(Box::new(operators::and_or::AndOrMutation::and_test()));
        registry.register(Box::new(operators::lambda::LambdaMutation));
        registry.register(Box::new(operators::assignment::AssignmentMutation::expr_stmt()));
        registry.register(Box::new(operators::assignment::AssignmentMutation::annassign()));
        registry.register(Box::new(operators::decorator::DecoratorMutation));
        registry
    }
}

impl OperatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Register an operator, replacing any previous one for its category.
    pub fn register(&mut self, operator: Box<dyn MutationOperator>) {
        self.operators.insert(operator.category(), operator);
    }

    pub fn get(&self, category: MutationCategory) -> Option<&dyn MutationOperator> {
        self.operators.get(&category).map(|op| op.as_ref())
    }

    /// Categories with a registered operator, in name order.
    pub fn categories(&self) -> Vec<MutationCategory> {
        let mut categories: Vec<_> = self.operators.keys().copied().collect();
        categories.sort();
        categories
    }
}

static CATALOG: Lazy<OperatorRegistry> = Lazy::new(OperatorRegistry::default);

/// The built-in operator catalog.
pub fn catalog() -> &'static OperatorRegistry {
    &CATALOG
}

/// Leaf kinds that carry keyword semantics even though the grammar names them.
const NAMED_KEYWORDS: &[&str] = &[
    "true",
    "false",
    "none",
    "break_statement",
    "continue_statement",
];

/// Classify a node into the category whose operator may mutate it.
pub fn category_of(tree: &SyntaxTree, node: NodeId) -> Option<MutationCategory> {
    let kind = tree.kind(node);
    if let Some(value) = tree.value(node) {
        return match kind {
            "identifier" => Some(MutationCategory::Name),
            "integer" | "float" => Some(MutationCategory::Number),
            "string" => Some(operators::string::string_category(value)),
            _ if NAMED_KEYWORDS.contains(&kind) => Some(MutationCategory::Keyword),
            _ if tree.is_named(node) => None,
            _ if !value.is_empty() && value.chars().all(|c| c.is_ascii_alphabetic()) => {
                Some(MutationCategory::Keyword)
            }
            _ if !value.is_empty() && value.chars().all(|c| c.is_ascii_punctuation()) => {
                Some(MutationCategory::Operator)
            }
            _ => None,
        };
    }

    match kind {
        "string" => {
            let start = tree.children(node).first().and_then(|&c| tree.value(c))?;
            Some(operators::string::string_category(start))
        }
        "keyword_argument" => Some(MutationCategory::Argument),
        "boolean_operator" => {
            let op = tree.child_by_field(node, "operator").and_then(|c| tree.value(c));
            match op {
                Some("or") => Some(MutationCategory::OrTest),
                Some("and") => Some(MutationCategory::AndTest),
                _ => None,
            }
        }
        "lambda" => Some(MutationCategory::Lambdef),
        "decorator" => Some(MutationCategory::Decorator),
        "assignment" => {
            if tree.child_by_field(node, "type").is_some() {
                Some(MutationCategory::Annassign)
            } else {
                Some(MutationCategory::ExprStmt)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_every_category() {
        let registry = catalog();
        assert_eq!(registry.categories(), MutationCategory::ALL.to_vec());
        for category in MutationCategory::ALL {
            assert_eq!(registry.get(category).unwrap().category(), category);
        }
    }

    #[test]
    fn test_category_names_round_trip() {
        for category in MutationCategory::ALL {
            assert_eq!(category.as_str().parse::<MutationCategory>().unwrap(), category);
        }
        let err = "bogus".parse::<MutationCategory>().unwrap_err();
        assert!(err.contains("bogus"));
    }

    #[test]
    fn test_outcome_alternatives() {
        assert!(MutationOutcome::Ineligible.into_alternatives().is_empty());
        let single = MutationOutcome::Single(Replacement::Value("-".into()));
        assert_eq!(single.into_alternatives().len(), 1);
    }

    #[test]
    fn test_empty_registry() {
        let registry = OperatorRegistry::new();
        assert!(registry.get(MutationCategory::Number).is_none());
        assert!(registry.categories().is_empty());
    }
}
