use clap::Parser;
use std::path::PathBuf;
use xcheck_harness::{Manifest, RunMode};

use crate::events;

const SHORT_DESCRIPTION: &str = "Interpreter conformance harness";

const LONG_DESCRIPTION: &str = r"
xcheck runs test programs on a target interpreter and compares their output
with the output of a reference interpreter, or with a stored expected-output
template (<test>.exp) when one exists.

Settings are read from xcheck.toml in the current directory (or the file given
with --config); command-line flags take precedence.
";

/// Identifies how tests reach the interpreter under test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum TargetKind {
    /// Run an interpreter binary on this machine.
    Local,
    /// Drive a board's raw REPL over TCP.
    RawRepl,
}

/// Parsed command-line arguments for xcheck.
#[derive(Parser)]
#[clap(name = "xcheck", version, about = SHORT_DESCRIPTION, long_about = LONG_DESCRIPTION)]
pub struct CommandLineArgs {
    /// Test files, or directories to search for tests.
    #[clap(value_name = "PATH", required = true)]
    pub test_paths: Vec<PathBuf>,

    /// Store the reference interpreter's output as the template of each test
    /// that has none, instead of running tests.
    #[clap(long = "write-exp")]
    pub write_exp: bool,

    /// Don't clear the interpreter's module search path.
    #[clap(long = "keep-path")]
    pub keep_path: bool,

    /// How to reach the interpreter under test.
    #[clap(long = "target", value_enum, default_value_t = TargetKind::Local)]
    pub target: TargetKind,

    /// Interpreter binary, for the local target.
    #[clap(long = "interpreter", env = "XCHECK_INTERPRETER", value_name = "PATH")]
    pub interpreter: Option<PathBuf>,

    /// Extra argument passed to the interpreter; may be repeated.
    #[clap(long = "interpreter-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub interpreter_args: Vec<String>,

    /// Address of the board's TCP bridge, for the raw-repl target.
    #[clap(
        long = "device",
        value_name = "HOST:PORT",
        required_if_eq("target", "raw-repl")
    )]
    pub device: Option<String>,

    /// Seconds to wait for a test before treating the target as hung.
    #[clap(long = "timeout", value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,

    /// Reference interpreter binary.
    #[clap(long = "oracle", env = "XCHECK_ORACLE", value_name = "PATH")]
    pub oracle: Option<PathBuf>,

    /// Path to the manifest.
    #[clap(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory that failure artifacts are written to.
    #[clap(long = "artifacts-dir", value_name = "DIR", default_value = ".")]
    pub artifacts_dir: PathBuf,

    /// List the tests that would run, and exit.
    #[clap(long = "list")]
    pub list: bool,

    /// Also write results to a JUnit XML file.
    #[clap(long = "junit", value_name = "FILE")]
    pub junit: Option<PathBuf>,

    /// Print a diff of expected and actual output for each failure.
    #[clap(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Enable debug logging for the given category.
    #[clap(long = "trace", value_name = "EVENT")]
    pub enabled_trace_events: Vec<events::TraceEvent>,
}

impl CommandLineArgs {
    /// Returns the run mode selected on the command line.
    pub const fn run_mode(&self) -> RunMode {
        if self.write_exp {
            RunMode::Record
        } else {
            RunMode::Compare
        }
    }

    /// Applies command-line overrides on top of the manifest's settings.
    pub fn apply_to(&self, mut manifest: Manifest) -> Manifest {
        if let Some(interpreter) = &self.interpreter {
            manifest.target.interpreter.clone_from(interpreter);
        }
        if !self.interpreter_args.is_empty() {
            manifest.target.args.clone_from(&self.interpreter_args);
        }
        if let Some(timeout_secs) = self.timeout_secs {
            manifest.target.timeout_secs = timeout_secs;
        }
        if let Some(oracle) = &self.oracle {
            manifest.oracle.program.clone_from(oracle);
        }

        manifest
    }
}
