//! Configuration for the harness.
//!
//! Settings come from three layers, lowest priority first: built-in defaults,
//! an optional TOML manifest (`xcheck.toml`), and command-line flags applied
//! by the caller. Unknown manifest fields are ignored so older harnesses can
//! read newer manifests.

use crate::error::ConfigLoadError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name of the manifest looked up in the current directory when none is
/// given explicitly.
pub const DEFAULT_MANIFEST_NAME: &str = "xcheck.toml";

/// Default per-test timeout on the target, in seconds.
pub const DEFAULT_TIMEOUT_IN_SECONDS: u64 = 10;

/// Root of the TOML manifest.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Test selection and classification.
    pub tests: TestsConfig,
    /// How to reach the target.
    pub target: TargetConfig,
    /// How to compute expected output when no template is stored.
    pub oracle: OracleConfig,
}

/// Test selection and classification settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TestsConfig {
    /// Glob patterns (relative to the test root) of tests never to run.
    pub skip: Vec<String>,
    /// Glob patterns of tests whose output must be normalized against their
    /// stored template before comparison.
    pub special: Vec<String>,
    /// File extension of test sources, used when walking directories.
    pub extension: String,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            skip: vec![],
            special: vec![],
            extension: String::from("py"),
        }
    }
}

/// Target settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TargetConfig {
    /// Interpreter to run tests with, for the local target.
    pub interpreter: PathBuf,
    /// Arguments passed to the interpreter before the source path.
    pub args: Vec<String>,
    /// Seconds to wait for one test before treating the target as hung.
    pub timeout_secs: u64,
    /// Environment variable holding the interpreter's module search path;
    /// cleared for each test unless asked to keep it.
    pub search_path_var: Option<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("micropython"),
            args: vec![],
            timeout_secs: DEFAULT_TIMEOUT_IN_SECONDS,
            search_path_var: Some(String::from("MICROPYPATH")),
        }
    }
}

impl TargetConfig {
    /// Returns the per-test timeout.
    pub const fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// Oracle settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Reference interpreter.
    pub program: PathBuf,
    /// Arguments passed to the reference interpreter before the source path.
    pub args: Vec<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python3"),
            args: vec![String::from("-B")],
        }
    }
}

/// Compiled test selection rules.
#[derive(Clone, Debug, Default)]
pub struct TestRules {
    skip: Vec<glob::Pattern>,
    special: Vec<glob::Pattern>,
}

impl TestRules {
    /// Compiles the patterns of the given tests configuration.
    pub fn new(config: &TestsConfig) -> Result<Self, ConfigLoadError> {
        Ok(Self {
            skip: compile_patterns(&config.skip)?,
            special: compile_patterns(&config.special)?,
        })
    }

    /// Returns whether the test with the given relative name is in the skip set.
    pub fn is_skipped(&self, relative_path: &Path) -> bool {
        matches_any(&self.skip, relative_path)
    }

    /// Returns whether the test with the given relative name needs its output
    /// normalized.
    pub fn is_special(&self, relative_path: &Path) -> bool {
        matches_any(&self.special, relative_path)
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<glob::Pattern>, ConfigLoadError> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| ConfigLoadError::InvalidPattern(p.clone(), e))
        })
        .collect()
}

fn matches_any(patterns: &[glob::Pattern], relative_path: &Path) -> bool {
    // `*` stays within one directory; `**` crosses them.
    let options = glob::MatchOptions {
        require_literal_separator: true,
        ..glob::MatchOptions::default()
    };

    // Patterns may name a test by its relative path or by its bare file name.
    let file_name = relative_path.file_name().map(Path::new);

    patterns.iter().any(|p| {
        p.matches_path_with(relative_path, options)
            || file_name.is_some_and(|name| p.matches_path_with(name, options))
    })
}

/// Whether to compare against the target or to record expected output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Run every test on the target and compare.
    #[default]
    Compare,
    /// Only compute expected output with the oracle, and store it as templates
    /// for tests that don't have one yet.
    Record,
}

/// Configuration for the test runner.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Compare or record.
    pub mode: RunMode,
    /// Directory that failure artifacts are written to.
    pub artifacts_dir: PathBuf,
    /// Whether to print a diff for each failure.
    pub verbose: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Compare,
            artifacts_dir: PathBuf::from("."),
            verbose: false,
        }
    }
}

impl RunnerConfig {
    /// Sets the run mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the artifacts directory.
    #[must_use]
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    /// Enables or disables verbose failure output.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Loads the manifest.
///
/// An explicitly given manifest must exist and parse. Without one, the
/// default manifest in the current directory is used if present; otherwise
/// defaults apply.
///
/// # Arguments
///
/// * `explicit_path` - Manifest path given by the user, if any.
pub fn load_manifest(explicit_path: Option<&Path>) -> Result<Manifest, ConfigLoadError> {
    let path = match explicit_path {
        Some(p) => p.to_path_buf(),
        None => {
            let default_path = PathBuf::from(DEFAULT_MANIFEST_NAME);
            if !default_path.exists() {
                return Ok(Manifest::default());
            }
            default_path
        }
    };

    let content =
        std::fs::read_to_string(&path).map_err(|e| ConfigLoadError::Io(path.clone(), e))?;

    let manifest = toml::from_str(&content).map_err(|e| ConfigLoadError::Parse(path.clone(), e))?;

    tracing::debug!(target: "runner", "loaded manifest {}", path.display());

    Ok(manifest)
}
