//! Test case definitions and discovery.

use crate::config::TestRules;
use crate::error::Error;
use std::path::{Path, PathBuf};

/// Extension appended to a test's source path to name its stored template.
pub const TEMPLATE_EXTENSION: &str = "exp";

/// A single test program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    /// Path to the test's source file.
    pub path: PathBuf,
    /// Path relative to the directory it was discovered in; used for skip and
    /// special rules.
    pub relative_path: PathBuf,
    /// Whether the test's output is non-deterministic and must be normalized
    /// against its template before comparison.
    pub special: bool,
    /// Whether the test is in the pre-registered skip set.
    pub skip: bool,
}

impl TestCase {
    /// Creates a test case, classifying it with the given rules.
    pub fn new(path: PathBuf, relative_path: PathBuf, rules: &TestRules) -> Self {
        let special = rules.is_special(&relative_path);
        let skip = rules.is_skipped(&relative_path);

        Self {
            path,
            relative_path,
            special,
            skip,
        }
    }

    /// Returns the test's name: its file name without extension.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Returns the test's file name, used to name failure artifacts.
    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Returns the path of the test's stored template.
    pub fn template_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".");
        path.push(TEMPLATE_EXTENSION);
        path.into()
    }
}

/// Finds tests given a mix of source files and directories.
///
/// Directories are walked recursively in file-name order, collecting files
/// with the given extension. Tests are returned in the order found.
///
/// # Arguments
///
/// * `paths` - Files and directories to search.
/// * `extension` - Extension of test sources (without the dot).
/// * `rules` - Skip and special rules to classify tests with.
pub fn discover_tests(
    paths: &[PathBuf],
    extension: &str,
    rules: &TestRules,
) -> Result<Vec<TestCase>, Error> {
    let mut tests = vec![];

    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
                    continue;
                }

                let relative_path = entry
                    .path()
                    .strip_prefix(path)
                    .unwrap_or(entry.path())
                    .to_path_buf();

                tests.push(TestCase::new(entry.into_path(), relative_path, rules));
            }
        } else if path.is_file() {
            let relative_path = path.file_name().map_or_else(|| path.clone(), PathBuf::from);
            tests.push(TestCase::new(path.clone(), relative_path, rules));
        } else {
            return Err(Error::TestNotFound(path.clone()));
        }
    }

    tracing::debug!(target: "runner", "discovered {} test(s)", tests.len());

    Ok(tests)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}
