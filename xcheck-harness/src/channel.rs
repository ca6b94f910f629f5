//! Interfaces to the target under test.

use crate::error::ChannelError;
use std::path::Path;

/// Output a target prints to ask that a test be skipped (e.g. because a
/// required feature isn't available on it).
pub const SKIP_OUTPUT: &[u8] = b"SKIP\n";

/// Text recorded in failure artifacts in place of output from a crashed target.
pub const CRASH_OUTPUT: &[u8] = b"CRASH";

/// Opens sessions on a target.
#[async_trait::async_trait]
pub trait ExecutionChannel: Send + Sync {
    /// Opens a new session. Only one session is expected to be open at a time.
    async fn open_session(&self) -> Result<Box<dyn Session>, ChannelError>;
}

/// An open session on a target; runs one program at a time.
#[async_trait::async_trait]
pub trait Session: Send {
    /// Runs the given source file on the target, returning its combined
    /// captured output.
    ///
    /// # Arguments
    ///
    /// * `source` - Path to the program's source.
    async fn run(&mut self, source: &Path) -> Result<Vec<u8>, ChannelError>;

    /// Releases the session.
    async fn close(self: Box<Self>) -> Result<(), ChannelError>;
}

/// What a target produced for one test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetOutput {
    /// The program ran; holds its output with `\n` line endings.
    Output(Vec<u8>),
    /// The target could not produce output.
    Crash(String),
    /// The target asked for the test to be skipped.
    Skip,
}

impl TargetOutput {
    /// Classifies the result of [`Session::run`].
    pub fn from_run_result(result: Result<Vec<u8>, ChannelError>) -> Self {
        match result {
            Ok(output) => {
                let output = crate::util::normalize_line_endings(&output);
                if output == SKIP_OUTPUT {
                    Self::Skip
                } else {
                    Self::Output(output)
                }
            }
            Err(err) => {
                tracing::debug!(target: "channel", "run failed: {err}");
                Self::Crash(err.to_string())
            }
        }
    }

    /// Returns the text to compare (and to persist on failure).
    pub const fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Output(output) => output.as_slice(),
            Self::Crash(_) => CRASH_OUTPUT,
            Self::Skip => SKIP_OUTPUT,
        }
    }
}
