//! Mutiny - Mutation testing for Python projects.
//!
//! Mutiny makes small, deliberate changes (mutants) to Python source code and
//! runs the project's tests against each one. A mutant the tests catch is
//! *killed*; one they miss *survives* and points at a gap in the tests.
//!
//! # Example
//!
//! ```no_run
//! use mutiny::config::RunConfig;
//! use mutiny::mutation::{list_mutations, MutationContext, Target};
//!
//! let source = "def add(a, b):\n    return a + b\n";
//! let mut ctx = MutationContext::new(source, Target::All, RunConfig::default())
//!     .with_filename("calc.py");
//! let mutants = list_mutations(&mut ctx).unwrap();
//! println!("{} mutants", mutants.len());
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod mutation;
pub mod output;
pub mod parser;

pub use core::{Error, Result};
