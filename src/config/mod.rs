//! Configuration loading and management.

mod run;

pub use run::{CoveredLines, RunConfig, DEFAULT_RUNNER};

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::core::Result;

/// Name of the standalone configuration file.
pub const CONFIG_FILE: &str = "mutiny.toml";

/// Settings read from configuration files and the environment.
///
/// Command-line flags take precedence over every field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Files and directories to mutate; guessed when empty.
    pub paths_to_mutate: Vec<String>,
    /// Glob patterns of files and directories to leave alone.
    pub paths_to_exclude: Vec<String>,
    /// Test command.
    pub runner: String,
    /// Directories holding the tests.
    pub tests_dir: Vec<String>,
    /// Extra callee names treated like `dict(...)`.
    pub dict_synonyms: Vec<String>,
    pub test_time_multiplier: f64,
    pub test_time_base: f64,
    pub swallow_output: bool,
    pub pre_mutation: Option<String>,
    pub post_mutation: Option<String>,
    pub rerun_all: bool,
    pub max_workers: usize,
    /// Fixed per-mutant timeout in seconds.
    pub timeout: Option<f64>,
    pub enable_mutation_types: Vec<String>,
    pub disable_mutation_types: Vec<String>,
    /// Location of the result cache, relative to the project root.
    pub cache_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths_to_mutate: Vec::new(),
            paths_to_exclude: Vec::new(),
            runner: DEFAULT_RUNNER.to_string(),
            tests_dir: vec!["tests/".to_string(), "test/".to_string()],
            dict_synonyms: Vec::new(),
            test_time_multiplier: 2.0,
            test_time_base: 0.0,
            swallow_output: true,
            pre_mutation: None,
            post_mutation: None,
            rerun_all: false,
            max_workers: 2,
            timeout: None,
            enable_mutation_types: Vec::new(),
            disable_mutation_types: Vec::new(),
            cache_file: ".mutiny-cache".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit file path.
    ///
    /// Errors if the file does not exist. Env vars with `MUTINY_` prefix
    /// override file values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(crate::core::Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let file = if path.file_name().is_some_and(|name| name == "pyproject.toml") {
            Figment::from(Toml::file_exact(path)).focus("tool.mutiny")
        } else {
            Figment::from(Toml::file_exact(path))
        };
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(file)
            .merge(Env::prefixed("MUTINY_"))
            .extract()?;
        Ok(config)
    }

    /// Load configuration from a project directory.
    ///
    /// Reads `[tool.mutiny]` from `pyproject.toml`, then `mutiny.toml`.
    /// Missing files are silently skipped (defaults are used). Env vars with
    /// `MUTINY_` prefix override file/default values.
    pub fn load_default(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Figment::from(Toml::file(dir.join("pyproject.toml"))).focus("tool.mutiny"))
            .merge(Toml::file(dir.join(CONFIG_FILE)))
            .merge(Env::prefixed("MUTINY_"))
            .extract()?;
        Ok(config)
    }
}
