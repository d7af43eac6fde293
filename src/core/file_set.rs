//! Discovery of the Python files to mutate and of the tests that judge them.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use walkdir::WalkDir;

use super::{Error, Result};

/// Fingerprint reported when no test files exist.
pub const NO_TESTS_FOUND: &str = "NO TESTS FOUND";

/// The Python source files selected for mutation.
#[derive(Debug, Clone)]
pub struct FileSet {
    files: Vec<PathBuf>,
}

impl FileSet {
    /// Collect `.py` files under `paths`.
    ///
    /// Directories listed in `tests_dirs` and anything matching one of the
    /// `exclude_patterns` globs (matched against file and directory names)
    /// are skipped, as are test modules. A path naming a file is taken as is.
    pub fn from_paths(
        paths: &[PathBuf],
        tests_dirs: &[PathBuf],
        exclude_patterns: &[String],
    ) -> Result<Self> {
        let excludes = build_globset(exclude_patterns)?;
        let mut files = Vec::new();

        for path in paths {
            if path.is_file() {
                files.push(path.clone());
                continue;
            }
            if !path.is_dir() {
                return Err(Error::FileNotFound { path: path.clone() });
            }

            let excludes = excludes.clone();
            let tests_dirs: Vec<PathBuf> = tests_dirs.to_vec();
            let walker = WalkBuilder::new(path)
                .hidden(true)
                .git_ignore(true)
                .git_global(true)
                .git_exclude(true)
                .filter_entry(move |entry| {
                    !excludes.is_match(entry.file_name())
                        && !tests_dirs.iter().any(|dir| same_path(entry.path(), dir))
                })
                .build();

            for entry in walker.flatten() {
                let file = entry.path();
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                if file.extension().is_none_or(|ext| ext != "py") || is_test_module(file) {
                    continue;
                }
                files.push(file.to_path_buf());
            }
        }

        // Sort for deterministic ordering
        files.sort();
        files.dedup();

        Ok(Self { files })
    }

    /// Get all files in the set.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Get the number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the file set is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over files.
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter()
    }
}

impl IntoIterator for FileSet {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::InvalidArgument(format!("invalid exclude pattern {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::InvalidArgument(e.to_string()))
}

fn same_path(a: &Path, b: &Path) -> bool {
    a.components().eq(b.components())
}

/// `test_*.py` and `*__tests.py` modules are never mutated.
fn is_test_module(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name.starts_with("test_") || name.ends_with("__tests.py")
}

/// Guess where the code to mutate lives when nothing was configured.
///
/// Tries `lib`, `src`, then a directory named like the project directory
/// (with `-`/space turned into `_` or dropped).
pub fn guess_paths_to_mutate(root: &Path) -> Result<PathBuf> {
    let dir_name = root
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();

    let mut candidates = vec!["lib".to_string(), "src".to_string()];
    if !dir_name.is_empty() {
        candidates.push(dir_name.clone());
        candidates.push(dir_name.replace('-', "_"));
        candidates.push(dir_name.replace(' ', "_"));
        candidates.push(dir_name.replace('-', ""));
        candidates.push(dir_name.replace(' ', ""));
    }

    candidates
        .into_iter()
        .find(|candidate| root.join(candidate).is_dir())
        .map(PathBuf::from)
        .ok_or_else(|| {
            Error::config(
                "Could not figure out where the code to mutate is. \
                 Please specify it with --paths-to-mutate or in mutiny.toml",
            )
        })
}

/// Hash of the test sources under `tests_dirs`.
///
/// A `.py` file counts as a test when its name starts with `test`, ends with
/// `_tests.py`, or it lives in a directory whose path mentions `test`.
pub fn hash_of_tests(tests_dirs: &[PathBuf]) -> Result<String> {
    let mut test_files = Vec::new();
    for dir in tests_dirs {
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "py") {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            let in_test_dir = path
                .parent()
                .is_some_and(|parent| parent.to_string_lossy().contains("test"));
            if name.starts_with("test") || name.ends_with("_tests.py") || in_test_dir {
                test_files.push(path.to_path_buf());
            }
        }
    }

    if test_files.is_empty() {
        return Ok(NO_TESTS_FOUND.to_string());
    }

    test_files.sort();
    test_files.dedup();
    let mut hasher = blake3::Hasher::new();
    for file in &test_files {
        hasher.update(file.to_string_lossy().as_bytes());
        hasher.update(&std::fs::read(file)?);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_file_set_collects_python_sources() {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("src");
        write(&src.join("pkg/a.py"), "x = 1\n");
        write(&src.join("pkg/b.py"), "y = 2\n");
        write(&src.join("pkg/test_a.py"), "def test(): pass\n");
        write(&src.join("pkg/README.md"), "# hi\n");
        write(&src.join("pkg/tests/test_b.py"), "def test(): pass\n");
        write(&src.join("generated/c.py"), "z = 3\n");

        let file_set = FileSet::from_paths(
            &[src.clone()],
            &[src.join("pkg/tests")],
            &["generated".to_string()],
        )
        .unwrap();

        let names: Vec<_> = file_set
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.py", "b.py"]);
    }

    #[test]
    fn test_file_set_accepts_single_file() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("one.py");
        write(&file, "x = 1\n");
        let file_set = FileSet::from_paths(&[file.clone()], &[], &[]).unwrap();
        assert_eq!(file_set.files(), &[file]);
    }

    #[test]
    fn test_file_set_missing_path() {
        let result = FileSet::from_paths(&[PathBuf::from("/nonexistent/dir")], &[], &[]);
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }

    #[test]
    fn test_guess_paths_to_mutate() {
        let temp = tempfile::tempdir().unwrap();
        assert!(guess_paths_to_mutate(temp.path()).is_err());
        std::fs::create_dir(temp.path().join("src")).unwrap();
        assert_eq!(guess_paths_to_mutate(temp.path()).unwrap(), PathBuf::from("src"));
        std::fs::create_dir(temp.path().join("lib")).unwrap();
        assert_eq!(guess_paths_to_mutate(temp.path()).unwrap(), PathBuf::from("lib"));
    }

    #[test]
    fn test_hash_of_tests() {
        let temp = tempfile::tempdir().unwrap();
        let tests = temp.path().join("tests");
        assert_eq!(hash_of_tests(&[tests.clone()]).unwrap(), NO_TESTS_FOUND);

        write(&tests.join("test_a.py"), "def test_a(): pass\n");
        let first = hash_of_tests(&[tests.clone()]).unwrap();
        assert_ne!(first, NO_TESTS_FOUND);
        assert_eq!(hash_of_tests(&[tests.clone()]).unwrap(), first);

        write(&tests.join("test_a.py"), "def test_a(): assert False\n");
        assert_ne!(hash_of_tests(&[tests]).unwrap(), first);
    }
}
