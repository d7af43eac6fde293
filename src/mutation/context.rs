//! Per-file, per-mutant walker state.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::RunConfig;
use crate::parser::NodeId;

use super::mutant::{MutantAddress, Target};
use super::operator::MutationCategory;

const PRAGMA: &str = "# pragma:";

/// State for one walk over one file.
///
/// A context is created for each mutant evaluation and owns a private copy of
/// the run configuration, so a hook that rewrites the test command only
/// affects this mutant.
#[derive(Clone)]
pub struct MutationContext {
    /// Mutation point(s) this walk acts on.
    pub target: Target,
    pub filename: Option<PathBuf>,
    /// Per-mutant copy of the run configuration.
    pub config: RunConfig,
    /// Set by a pre-mutation hook to skip this mutant.
    pub skip: bool,
    /// Position of this mutant in the run, for progress output.
    pub position: usize,
    /// Line (0-indexed) of the node most recently entered.
    pub current_line_index: usize,
    /// Next index to assign on the current line.
    pub index: usize,
    /// Addresses of the mutations applied so far.
    pub performed: Vec<MutantAddress>,
    /// Open return-annotation spans (`->` ... `:`) in the node being walked.
    pub annotation_depth: usize,
    pub(crate) stack: Vec<NodeId>,
    source: String,
    remove_newline_at_end: bool,
    lines: Vec<String>,
    pragma_lines: HashSet<usize>,
    dict_synonyms: Vec<String>,
}

impl MutationContext {
    /// Create a context over `source`.
    ///
    /// A missing final newline is added for parsing and removed again when
    /// the mutated source is rendered.
    pub fn new(source: impl Into<String>, target: Target, config: RunConfig) -> Self {
        let mut source = source.into();
        let mut remove_newline_at_end = false;
        if !source.is_empty() && !source.ends_with('\n') {
            source.push('\n');
            remove_newline_at_end = true;
        }

        let lines: Vec<String> = source.split('\n').map(str::to_string).collect();
        let pragma_lines = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| {
                line.rsplit_once(PRAGMA)
                    .is_some_and(|(_, rest)| rest.contains("no mutate"))
            })
            .map(|(i, _)| i)
            .collect();

        let mut dict_synonyms = config.dict_synonyms.clone();
        if !dict_synonyms.iter().any(|name| name == "dict") {
            dict_synonyms.push("dict".to_string());
        }

        Self {
            target,
            filename: None,
            config,
            skip: false,
            position: 0,
            current_line_index: 0,
            index: 0,
            performed: Vec::new(),
            annotation_depth: 0,
            stack: Vec::new(),
            source,
            remove_newline_at_end,
            lines,
            pragma_lines,
            dict_synonyms,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    /// Source as parsed (always newline-terminated).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Source exactly as it was handed in.
    pub fn original_source(&self) -> &str {
        if self.remove_newline_at_end {
            &self.source[..self.source.len() - 1]
        } else {
            &self.source
        }
    }

    pub(crate) fn remove_newline_at_end(&self) -> bool {
        self.remove_newline_at_end
    }

    pub fn current_source_line(&self) -> &str {
        self.lines
            .get(self.current_line_index)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Address of the next mutation point on the current line.
    pub fn address_of_current_index(&self) -> MutantAddress {
        let address = MutantAddress::new(
            self.current_line_index,
            self.index,
            self.current_source_line(),
        );
        match &self.filename {
            Some(filename) => address.with_filename(filename.clone()),
            None => address,
        }
    }

    /// Callee names whose keyword arguments are treated as dict keys.
    pub fn dict_synonyms(&self) -> &[String] {
        &self.dict_synonyms
    }

    /// Ancestor `n` levels above the node being visited (0 is the node itself).
    pub fn ancestor(&self, n: usize) -> Option<NodeId> {
        self.stack.len().checked_sub(n + 1).map(|i| self.stack[i])
    }

    /// Whether the current line is off limits: marked `# pragma: no mutate`
    /// or outside the covered-lines filter.
    pub fn exclude_line(&self) -> bool {
        if self.pragma_lines.contains(&self.current_line_index) {
            return true;
        }
        let Some(covered) = &self.config.covered_lines_by_filename else {
            return false;
        };
        let lines = self
            .filename
            .as_ref()
            .and_then(|filename| covered.get(filename));
        match lines {
            Some(lines) => !lines.contains(&(self.current_line_index + 1)),
            None => true,
        }
    }

    /// Whether a mutation of `category` at the current index should be applied.
    pub fn should_mutate(&self, category: MutationCategory) -> bool {
        if !self.config.mutation_types_to_apply.contains(&category) {
            return false;
        }
        match &self.target {
            Target::All => true,
            Target::One(address) => *address == self.address_of_current_index(),
        }
    }

    /// Whether a single-target walk has already done its job.
    pub fn is_done(&self) -> bool {
        !self.performed.is_empty() && !self.target.is_all()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_missing_newline_is_tracked() {
        let ctx = MutationContext::new("x = 1", Target::All, RunConfig::default());
        assert_eq!(ctx.source(), "x = 1\n");
        assert_eq!(ctx.original_source(), "x = 1");
        assert!(ctx.remove_newline_at_end());

        let ctx = MutationContext::new("x = 1\n", Target::All, RunConfig::default());
        assert!(!ctx.remove_newline_at_end());
    }

    #[test]
    fn test_pragma_lines() {
        let source = "a = 1\nb = 2  # pragma: no mutate\nc = 3  # pragma: no cover\n";
        let mut ctx = MutationContext::new(source, Target::All, RunConfig::default());
        ctx.current_line_index = 1;
        assert!(ctx.exclude_line());
        ctx.current_line_index = 2;
        assert!(!ctx.exclude_line());
    }

    #[test]
    fn test_covered_lines_filter() {
        let mut covered = HashMap::new();
        covered.insert(PathBuf::from("foo.py"), HashSet::from([2]));
        let config = RunConfig {
            covered_lines_by_filename: Some(Arc::new(covered)),
            ..RunConfig::default()
        };

        let mut ctx = MutationContext::new("a = 1\nb = 2\n", Target::All, config.clone())
            .with_filename("foo.py");
        assert!(ctx.exclude_line());
        ctx.current_line_index = 1;
        assert!(!ctx.exclude_line());

        let ctx = MutationContext::new("a = 1\n", Target::All, config).with_filename("bar.py");
        assert!(ctx.exclude_line(), "files missing from the filter are excluded");
    }

    #[test]
    fn test_dict_is_always_a_synonym() {
        let config = RunConfig {
            dict_synonyms: vec!["Struct".to_string()],
            ..RunConfig::default()
        };
        let ctx = MutationContext::new("", Target::All, config);
        assert_eq!(ctx.dict_synonyms(), ["Struct".to_string(), "dict".to_string()]);
    }

    #[test]
    fn test_should_mutate_respects_categories_and_target() {
        let config = RunConfig {
            mutation_types_to_apply: HashSet::from([MutationCategory::Number]),
            ..RunConfig::default()
        };
        let target = Target::One(MutantAddress::new(0, 1, ""));
        let mut ctx = MutationContext::new("x = 1\n", target, config);
        assert!(!ctx.should_mutate(MutationCategory::Number));
        ctx.index = 1;
        assert!(ctx.should_mutate(MutationCategory::Number));
        assert!(!ctx.should_mutate(MutationCategory::Operator));
    }
}
