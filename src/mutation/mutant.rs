//! Mutant identity and outcome types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies the n-th mutable point on a source line.
///
/// Equality and hashing only consider `line_number` and `index`, so an
/// address found in one file can be matched against a cache row recorded
/// under a different path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutantAddress {
    /// Line of the mutation point (0-indexed).
    pub line_number: usize,
    /// Position among the mutation points of that line.
    pub index: usize,
    /// Text of the source line, for display.
    pub line_text: String,
    /// File the address was produced from.
    pub filename: Option<PathBuf>,
}

impl MutantAddress {
    pub fn new(line_number: usize, index: usize, line_text: impl Into<String>) -> Self {
        Self {
            line_number,
            index,
            line_text: line_text.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

impl PartialEq for MutantAddress {
    fn eq(&self, other: &Self) -> bool {
        self.line_number == other.line_number && self.index == other.index
    }
}

impl Eq for MutantAddress {}

impl std::hash::Hash for MutantAddress {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.line_number.hash(state);
        self.index.hash(state);
    }
}

impl PartialOrd for MutantAddress {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MutantAddress {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.line_number, self.index).cmp(&(other.line_number, other.index))
    }
}

impl fmt::Display for MutantAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line_number + 1, self.index)
    }
}

/// Which mutation points a walk should act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Apply every mutation; used to enumerate a file's mutants.
    All,
    /// Apply only the mutation at this address.
    One(MutantAddress),
}

impl Target {
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// The single address targeted, if any.
    pub fn address(&self) -> Option<&MutantAddress> {
        match self {
            Self::All => None,
            Self::One(address) => Some(address),
        }
    }
}

/// Outcome of evaluating a mutant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    /// Not evaluated against the current tests yet.
    Untested,
    /// A pre-mutation hook asked to skip it.
    Skipped,
    /// Test execution timed out.
    Timeout,
    /// Tests passed, but took much longer than the baseline.
    Suspicious,
    /// Tests passed - the mutant was not detected (bad).
    Survived,
    /// Tests failed - the mutant was detected (good).
    Killed,
}

impl MutationStatus {
    pub const ALL: [MutationStatus; 6] = [
        Self::Untested,
        Self::Skipped,
        Self::Timeout,
        Self::Suspicious,
        Self::Survived,
        Self::Killed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Untested => "untested",
            Self::Skipped => "skipped",
            Self::Timeout => "timeout",
            Self::Suspicious => "suspicious",
            Self::Survived => "survived",
            Self::Killed => "killed",
        }
    }

    /// Whether this status is a final evaluation result.
    pub fn is_terminal(self) -> bool {
        self != Self::Untested
    }
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        // Accept the legacy spellings used in older caches.
        let normalized = match normalized.as_str() {
            "ok_killed" | "bad_killed" => "killed",
            "bad_survived" => "survived",
            "ok_suspicious" => "suspicious",
            "bad_timeout" => "timeout",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "Unknown status: {s}. Use one of: {}",
                    Self::ALL.map(|status| status.as_str()).join(", ")
                )
            })
    }
}
