//! Line filters restricting mutation to covered or changed lines.
//!
//! Supported sources:
//! - coverage.py JSON (`coverage json`)
//! - unified diffs (`git diff`, `diff -u`)

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::config::CoveredLines;
use crate::core::{Error, Result};

static HUNK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,\d+)? @@").expect("valid regex")
});

#[derive(Debug, Deserialize)]
struct CoveragePyReport {
    files: HashMap<String, CoveragePyFile>,
}

#[derive(Debug, Deserialize)]
struct CoveragePyFile {
    executed_lines: Vec<usize>,
}

/// Parse coverage.py JSON output.
///
/// Paths are made relative to `root` where possible, matching how files to
/// mutate are named.
pub fn read_coverage_py(path: &Path, root: &Path) -> Result<CoveredLines> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })?;
    parse_coverage_py(&content, root)
}

fn parse_coverage_py(content: &str, root: &Path) -> Result<CoveredLines> {
    let report: CoveragePyReport = serde_json::from_str(content)
        .map_err(|e| Error::InvalidArgument(format!("Failed to parse coverage.py JSON: {e}")))?;

    let mut covered = HashMap::new();
    for (file_path, file_data) in report.files {
        let lines: HashSet<usize> = file_data.executed_lines.into_iter().collect();
        covered.insert(normalize(Path::new(&file_path), root), lines);
    }
    Ok(covered)
}

/// Lines added by a unified diff, per new-side file.
pub fn read_patch(path: &Path, root: &Path) -> Result<CoveredLines> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })?;
    Ok(parse_patch(&content, root))
}

fn parse_patch(content: &str, root: &Path) -> CoveredLines {
    let mut covered: CoveredLines = HashMap::new();
    let mut current: Option<PathBuf> = None;
    let mut new_line = 0usize;
    let mut in_hunk = false;

    for line in content.lines() {
        if let Some(target) = line.strip_prefix("+++ ") {
            let target = target.split('\t').next().unwrap_or_default().trim();
            current = (target != "/dev/null").then(|| {
                let target = target.strip_prefix("b/").unwrap_or(target);
                normalize(Path::new(target), root)
            });
            in_hunk = false;
            continue;
        }
        if line.starts_with("--- ") && !in_hunk {
            continue;
        }
        if let Some(captures) = HUNK_HEADER.captures(line) {
            new_line = captures[1].parse().unwrap_or_default();
            in_hunk = true;
            continue;
        }
        if !in_hunk {
            continue;
        }
        let Some(file) = &current else {
            continue;
        };
        match line.as_bytes().first() {
            Some(b'+') => {
                covered.entry(file.clone()).or_default().insert(new_line);
                new_line += 1;
            }
            Some(b' ') | None => new_line += 1,
            Some(b'-') | Some(b'\\') => {}
            _ => in_hunk = false,
        }
    }
    covered
}

/// Strip `root` and `.` components so paths compare equal regardless of how
/// the tool that produced them was invoked.
pub fn normalize(path: &Path, root: &Path) -> PathBuf {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
