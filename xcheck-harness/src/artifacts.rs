//! Failure artifacts and stored templates on disk.

use crate::error::Error;
use std::path::{Path, PathBuf};

/// Paths of the pair of files written for a failed test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Expected output.
    pub expected: PathBuf,
    /// Actual output.
    pub actual: PathBuf,
}

impl ArtifactPaths {
    /// Computes artifact paths for the test with the given file name.
    ///
    /// The expected-output artifact is normally `<basename>.exp`, which is also
    /// how stored templates are named. When that would be the test's own
    /// template (the artifacts directory is the test's directory), both
    /// artifacts are named `<basename>.fail.*` instead so the template is
    /// never overwritten or removed.
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory artifacts are written to.
    /// * `basename` - The test's file name.
    /// * `template` - Path of the test's stored template.
    pub fn new(dir: &Path, basename: &str, template: &Path) -> Self {
        let expected = dir.join(format!("{basename}.exp"));
        if !same_location(&expected, template) {
            return Self {
                expected,
                actual: dir.join(format!("{basename}.out")),
            };
        }

        tracing::debug!(
            target: "runner",
            "artifacts for {basename} would clobber {}; using .fail suffix",
            template.display()
        );

        Self {
            expected: dir.join(format!("{basename}.fail.exp")),
            actual: dir.join(format!("{basename}.fail.out")),
        }
    }

    /// Writes both artifacts, verbatim.
    pub fn write(&self, expected: &[u8], actual: &[u8]) -> Result<(), Error> {
        write_file(&self.expected, expected)?;
        write_file(&self.actual, actual)
    }

    /// Removes both artifacts, if present.
    pub fn remove(&self) -> Result<(), Error> {
        remove_file_if_exists(&self.expected)?;
        remove_file_if_exists(&self.actual)
    }
}

/// Reads a stored template, if there is one.
pub fn read_template(path: &Path) -> Result<Option<Vec<u8>>, Error> {
    match std::fs::read(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Artifact(path.to_path_buf(), e)),
    }
}

/// Stores a template.
pub fn write_template(path: &Path, contents: &[u8]) -> Result<(), Error> {
    write_file(path, contents)
}

/// Returns whether two paths name the same file, whether or not it exists yet.
fn same_location(a: &Path, b: &Path) -> bool {
    match (resolve(a), resolve(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Resolves a path's directory, leaving its final component alone.
fn resolve(path: &Path) -> Option<PathBuf> {
    let file_name = path.file_name()?;
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    std::fs::canonicalize(parent)
        .ok()
        .map(|dir| dir.join(file_name))
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), Error> {
    std::fs::write(path, contents).map_err(|e| Error::Artifact(path.to_path_buf(), e))
}

fn remove_file_if_exists(path: &Path) -> Result<(), Error> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Artifact(path.to_path_buf(), e)),
    }
}
