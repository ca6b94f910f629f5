//! Error types for the harness.

use std::path::PathBuf;

/// Errors raised by an execution channel while talking to the target.
///
/// Any of these surfacing from [`crate::Session::run`] is converted into a
/// crash verdict for the test in question; they are only fatal when opening or
/// closing the session.
#[derive(thiserror::Error, Debug)]
pub enum ChannelError {
    /// An I/O error occurred talking to the target.
    #[error("i/o error talking to target: {0}")]
    Io(#[from] std::io::Error),

    /// The target did not respond in time.
    #[error("target timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The target responded, but not in the expected way.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The interpreter process could not be started.
    #[error("failed to launch interpreter {0}: {1}")]
    Launch(PathBuf, std::io::Error),

    /// The interpreter process was terminated by a signal or exited abnormally.
    #[error("interpreter terminated abnormally: {0}")]
    AbnormalExit(String),
}

/// Errors raised while running the reference interpreter.
#[derive(thiserror::Error, Debug)]
pub enum OracleError {
    /// The oracle process could not be started.
    #[error("failed to launch oracle {0}: {1}")]
    Launch(PathBuf, std::io::Error),

    /// The oracle exited with a failure status.
    #[error("oracle exited with {status}")]
    Failed {
        /// Exit status, in display form.
        status: String,
        /// Captured standard error.
        stderr: String,
    },
}

/// Errors that can occur when loading the test manifest.
#[derive(thiserror::Error, Debug)]
pub enum ConfigLoadError {
    /// Failed to read the manifest.
    #[error("failed to read manifest {0}: {1}")]
    Io(PathBuf, std::io::Error),

    /// Failed to parse the TOML content.
    #[error("failed to parse manifest {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    /// A skip or special pattern is not a valid glob.
    #[error("invalid test pattern '{0}': {1}")]
    InvalidPattern(String, glob::PatternError),
}

/// Monolithic error type for run-level failures.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The execution channel failed outside of a single test.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The manifest could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    /// A test source or directory could not be found.
    #[error("no such test file or directory: {0}")]
    TestNotFound(PathBuf),

    /// Walking a test directory failed.
    #[error("failed to walk test directory: {0}")]
    Discovery(#[from] walkdir::Error),

    /// Reading or writing a stored template or failure artifact failed.
    #[error("failed to access {0}: {1}")]
    Artifact(PathBuf, std::io::Error),

    /// Writing the report failed.
    #[error("failed to write report: {0}")]
    Report(String),

    /// Generic I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
