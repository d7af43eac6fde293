//! Built-in mutation operators, one module per syntactic category family.
//!
//! - symbol: arithmetic, bitwise, comparison and augmented-assignment tokens
//! - keyword: `True`/`False`, `break`/`continue`, `not`, `is`, `in`
//! - number: numeric literals
//! - string: plain and formatted string literals
//! - name: well-known builtins and bare subscript/call arguments
//! - argument: keyword arguments to dict-like constructors
//! - and_or: boolean connectives
//! - lambda: lambda bodies
//! - decorator: decorator removal
//! - assignment: right-hand sides of (annotated) assignments

pub mod and_or;
pub mod argument;
pub mod assignment;
pub mod decorator;
pub mod keyword;
pub mod lambda;
pub mod name;
pub mod number;
pub mod string;
pub mod symbol;

pub use and_or::AndOrMutation;
pub use argument::ArgumentMutation;
pub use assignment::AssignmentMutation;
pub use decorator::DecoratorMutation;
pub use keyword::KeywordMutation;
pub use lambda::LambdaMutation;
pub use name::NameMutation;
pub use number::NumberMutation;
pub use string::StringMutation;
pub use symbol::OperatorMutation;

use super::operator::{MutationOutcome, Replacement};

/// Look up `value` in a replacement table.
pub(crate) fn lookup(table: &[(&str, &str)], value: &str) -> MutationOutcome {
    table
        .iter()
        .find(|(from, _)| *from == value)
        .map(|(_, to)| MutationOutcome::Single(Replacement::Value((*to).to_string())))
        .unwrap_or(MutationOutcome::Ineligible)
}
