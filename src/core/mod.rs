//! Core types shared by the whole crate.

mod error;
pub mod file_set;
pub mod progress;

pub use error::{Error, Result};
pub use file_set::{guess_paths_to_mutate, hash_of_tests, FileSet, NO_TESTS_FOUND};
pub use progress::Progress;
