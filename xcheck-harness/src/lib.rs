//! Conformance harness for interpreters running on constrained targets.
//!
//! Each test is a program run twice: once by a reference interpreter (the
//! oracle) on the host, and once on the target. The two outputs must be
//! byte-identical. Tests whose output is legitimately non-deterministic
//! (addresses, timings, memory statistics) instead store an expected-output
//! template, and the target's output is normalized against it first.
//!
//! # Templates
//!
//! A template is the expected output, line by line. Within a line, the
//! characters `( ) [ ] { } . * + ^ $` act as regex metacharacters unless
//! preceded by a backslash; everything else matches literally. A line that
//! reads exactly `########` matches any run of zero or more actual lines, up
//! to the first line accepted by the template line that follows it.

pub mod artifacts;
pub mod channel;
mod comparison;
mod config;
mod error;
pub mod oracle;
pub mod pattern;
pub mod process;
pub mod rawrepl;
mod report;
mod runner;
pub mod template;
mod testcase;
pub mod util;

pub use channel::{ExecutionChannel, Session, TargetOutput};
pub use comparison::{ExpectedOutput, OutputComparison, compare_output};
pub use config::{
    DEFAULT_MANIFEST_NAME, DEFAULT_TIMEOUT_IN_SECONDS, Manifest, OracleConfig, RunMode,
    RunnerConfig, TargetConfig, TestRules, TestsConfig, load_manifest,
};
pub use error::{ChannelError, ConfigLoadError, Error, OracleError};
pub use oracle::{Oracle, ProcessOracle};
pub use process::LocalInterpreter;
pub use rawrepl::RawReplChannel;
pub use report::{RunReport, TestResult, Verdict};
pub use runner::TestRunner;
pub use template::Template;
pub use testcase::{TEMPLATE_EXTENSION, TestCase, discover_tests};
