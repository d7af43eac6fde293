//! Mutation testing for Python sources.
//!
//! Mutants are generated by walking the syntax tree of a file and asking the
//! operator registered for each node's category for replacements. Each
//! mutation point is addressed by its line and its index on that line, which
//! stays stable as long as the file does not change.
//!
//! Evaluation applies one mutant at a time to disk, runs the test command
//! against it and classifies the outcome:
//!
//! - **Killed**: the tests failed, so they detect the change
//! - **Survived**: the tests still passed
//! - **Suspicious**: the tests passed, but much slower than the baseline
//! - **Timeout**: the tests did not finish in time
//! - **Skipped**: a pre-mutation hook declined the mutant

pub mod aggregate;
mod context;
pub mod coverage;
mod executor;
pub mod hooks;
mod mutant;
mod operator;
pub mod operators;
pub mod runner;
mod safety;
pub mod walker;
pub mod worker;

pub use aggregate::{exit_code, RunSummary};
pub use context::MutationContext;
pub use executor::{time_test_suite, Evaluator};
pub use hooks::{FnHooks, MutationHooks};
pub use mutant::{MutantAddress, MutationStatus, Target};
pub use operator::{
    catalog, category_of, MutationCategory, MutationOperator, MutationOutcome, NewChild,
    OperatorRegistry, Replacement,
};
pub use runner::{InProcessRunner, ShellRunner, TestOutcome, TestRunner};
pub use safety::{atomic_write, FileLocks, MutationGuard};
pub use walker::{list_mutations, mutate};
pub use worker::{FileMutants, Pipeline, RunReport};
