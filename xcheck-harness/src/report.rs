//! Accumulation and reporting of run results.

use crate::error::Error;
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;

/// Final classification of a single test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Actual output matched expected output.
    Passed,
    /// Actual output differed, or the target or oracle crashed.
    Failed,
    /// The test was not compared.
    Skipped,
}

impl Verdict {
    /// Returns the status word printed for a test with this verdict.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Passed => "pass",
            Self::Failed => "FAIL",
            Self::Skipped => "skip",
        }
    }
}

/// Result of running a single test.
#[derive(Clone, Debug)]
pub struct TestResult {
    /// Name of the test.
    pub name: String,
    /// Path to the test's source.
    pub path: PathBuf,
    /// How the test was classified.
    pub verdict: Verdict,
    /// Time spent producing and checking the test's output.
    pub duration: std::time::Duration,
}

/// Accumulated results of a run.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    /// Number of tests performed (i.e. not skipped).
    pub test_count: usize,
    /// Number of individual assertions (expected output lines) checked.
    pub testcase_count: usize,
    /// Number of tests that passed.
    pub passed_count: usize,
    /// Names of tests that failed, in run order.
    pub failed: Vec<String>,
    /// Names of tests that were skipped, in run order.
    pub skipped: Vec<String>,
    /// Every recorded result, in run order.
    pub results: Vec<TestResult>,
    /// Whether the run was cancelled before all tests ran.
    pub interrupted: bool,
}

impl RunReport {
    /// Records a test's verdict.
    ///
    /// # Arguments
    ///
    /// * `result` - The test's result.
    /// * `assertion_count` - Number of expected output lines checked; ignored
    ///   for skipped tests.
    pub fn record(&mut self, result: TestResult, assertion_count: usize) {
        match result.verdict {
            Verdict::Passed => {
                self.test_count += 1;
                self.testcase_count += assertion_count;
                self.passed_count += 1;
            }
            Verdict::Failed => {
                self.test_count += 1;
                self.testcase_count += assertion_count;
                self.failed.push(result.name.clone());
            }
            Verdict::Skipped => {
                self.skipped.push(result.name.clone());
            }
        }

        self.results.push(result);
    }

    /// Returns the total number of verdicts recorded.
    pub const fn verdict_count(&self) -> usize {
        self.passed_count + self.failed.len() + self.skipped.len()
    }

    /// Returns whether the run as a whole succeeded.
    pub const fn success(&self) -> bool {
        self.failed.is_empty() && !self.interrupted
    }

    /// Writes the end-of-run summary.
    pub fn write_summary(&self, mut writer: impl Write) -> std::io::Result<()> {
        if self.interrupted {
            writeln!(writer, "{}", "interrupted".bright_red())?;
        }

        writeln!(
            writer,
            "{} tests performed ({} individual testcases)",
            self.test_count, self.testcase_count
        )?;
        writeln!(
            writer,
            "{} tests passed",
            self.passed_count.to_string().green()
        )?;

        if !self.skipped.is_empty() {
            writeln!(
                writer,
                "{} tests skipped: {}",
                self.skipped.len().to_string().cyan(),
                self.skipped.join(" ")
            )?;
        }

        if !self.failed.is_empty() {
            writeln!(
                writer,
                "{} tests failed: {}",
                self.failed.len().to_string().red(),
                self.failed.join(" ")
            )?;
        }

        Ok(())
    }

    /// Writes the results as a JUnit XML report.
    pub fn write_junit(&self, writer: impl Write) -> Result<(), Error> {
        let mut suite = junit_report::TestSuite::new("xcheck");

        for result in &self.results {
            let name = result.path.to_string_lossy();
            let duration = result
                .duration
                .try_into()
                .map_err(|e| Error::Report(format!("invalid duration: {e}")))?;

            let test_case = match result.verdict {
                Verdict::Passed => junit_report::TestCase::success(&name, duration),
                Verdict::Failed => junit_report::TestCase::failure(
                    &name,
                    duration,
                    "output mismatch",
                    "actual output differs from expected output",
                ),
                Verdict::Skipped => junit_report::TestCase::skipped(&name),
            };

            suite.add_testcase(test_case);
        }

        let mut report = junit_report::Report::new();
        report.add_testsuite(suite);
        report
            .write_xml(writer)
            .map_err(|e| Error::Report(e.to_string()))
    }
}
