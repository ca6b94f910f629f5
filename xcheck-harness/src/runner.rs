//! Test runner implementation.

use crate::artifacts::{self, ArtifactPaths};
use crate::channel::{ExecutionChannel, Session, TargetOutput};
use crate::comparison::{ExpectedOutput, OutputComparison, compare_output};
use crate::config::{RunMode, RunnerConfig};
use crate::error::Error;
use crate::oracle::Oracle;
use crate::report::{RunReport, TestResult, Verdict};
use crate::testcase::TestCase;
use crate::util::{count_lines, normalize_line_endings, write_diff};
use colored::Colorize;
use std::io::Write;
use tokio::sync::watch;

/// The main test runner.
pub struct TestRunner {
    config: RunnerConfig,
}

/// What running one test produced, before it's recorded.
struct TestOutcome {
    verdict: Verdict,
    assertion_count: usize,
    comparison: Option<OutputComparison>,
}

impl TestOutcome {
    const fn skipped() -> Self {
        Self {
            verdict: Verdict::Skipped,
            assertion_count: 0,
            comparison: None,
        }
    }
}

impl TestRunner {
    /// Creates a new test runner with the given configuration.
    pub const fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Runs the given tests in order and returns the accumulated report.
    ///
    /// In compare mode a single session is opened on the target before the
    /// first test and closed after the last one, including when the run is
    /// cancelled or fails. In record mode the target is never contacted.
    ///
    /// # Arguments
    ///
    /// * `tests` - Tests to run, in order.
    /// * `channel` - Channel to the target.
    /// * `oracle` - Computes expected output for tests with no stored template.
    /// * `shutdown` - Becomes `true` when the run should be cancelled.
    /// * `out` - Receives per-test status lines and diffs.
    pub async fn run(
        &self,
        tests: &[TestCase],
        channel: &dyn ExecutionChannel,
        oracle: &dyn Oracle,
        mut shutdown: watch::Receiver<bool>,
        out: &mut (impl Write + Send),
    ) -> Result<RunReport, Error> {
        if matches!(self.config.mode, RunMode::Record) {
            return self.record_templates(tests, oracle, &mut shutdown, out).await;
        }

        let mut session = channel.open_session().await?;
        tracing::debug!(target: "runner", "session opened");

        let result = self
            .compare_all(tests, session.as_mut(), oracle, &mut shutdown, out)
            .await;

        let close_result = session.close().await;
        tracing::debug!(target: "runner", "session closed");

        let report = result?;
        close_result?;

        Ok(report)
    }

    async fn compare_all(
        &self,
        tests: &[TestCase],
        session: &mut dyn Session,
        oracle: &dyn Oracle,
        shutdown: &mut watch::Receiver<bool>,
        out: &mut (impl Write + Send),
    ) -> Result<RunReport, Error> {
        let mut report = RunReport::default();

        for test in tests {
            if *shutdown.borrow() {
                report.interrupted = true;
                break;
            }

            let start_time = std::time::Instant::now();

            let outcome = if test.skip {
                TestOutcome::skipped()
            } else {
                let outcome = tokio::select! {
                    () = wait_for_cancellation(shutdown) => None,
                    outcome = self.compare_one(test, session, oracle) => Some(outcome),
                };

                let Some(outcome) = outcome else {
                    tracing::info!(target: "runner", "run interrupted during {}", test.path.display());
                    report.interrupted = true;
                    break;
                };

                outcome
            };

            self.finish_test(&mut report, test, outcome, start_time.elapsed(), out)?;
        }

        Ok(report)
    }

    /// Runs one test and classifies it. Nothing that goes wrong here is
    /// allowed to end the run; failures become the test's verdict.
    async fn compare_one(
        &self,
        test: &TestCase,
        session: &mut dyn Session,
        oracle: &dyn Oracle,
    ) -> TestOutcome {
        let expected = expected_output(test, oracle).await;

        let actual = TargetOutput::from_run_result(session.run(&test.path).await);
        if matches!(actual, TargetOutput::Skip) {
            return TestOutcome::skipped();
        }

        let comparison = compare_output(&expected, &actual, test.special);
        let artifact_paths = ArtifactPaths::new(
            &self.config.artifacts_dir,
            &test.basename(),
            &test.template_path(),
        );

        let (verdict, artifact_result) = match &comparison {
            OutputComparison::Same => (Verdict::Passed, artifact_paths.remove()),
            OutputComparison::TestDiffers { expected, actual } => {
                (Verdict::Failed, artifact_paths.write(expected, actual))
            }
        };

        if let Err(err) = artifact_result {
            tracing::error!(target: "runner", "{}: {err}", test.path.display());
        }

        TestOutcome {
            verdict,
            assertion_count: expected.assertion_count(),
            comparison: Some(comparison),
        }
    }

    async fn record_templates(
        &self,
        tests: &[TestCase],
        oracle: &dyn Oracle,
        shutdown: &mut watch::Receiver<bool>,
        out: &mut (impl Write + Send),
    ) -> Result<RunReport, Error> {
        let mut report = RunReport::default();

        for test in tests {
            if *shutdown.borrow() {
                report.interrupted = true;
                break;
            }

            let start_time = std::time::Instant::now();
            let template_path = test.template_path();

            let outcome = if test.skip || template_path.exists() {
                TestOutcome::skipped()
            } else {
                let output = tokio::select! {
                    () = wait_for_cancellation(shutdown) => None,
                    output = oracle.run(&test.path) => Some(output),
                };

                let Some(output) = output else {
                    report.interrupted = true;
                    break;
                };

                let failed = TestOutcome {
                    verdict: Verdict::Failed,
                    assertion_count: 0,
                    comparison: None,
                };

                match output {
                    Ok(output) => {
                        let output = normalize_line_endings(&output);
                        match artifacts::write_template(&template_path, &output) {
                            Ok(()) => {
                                tracing::debug!(target: "runner", "wrote {}", template_path.display());
                                TestOutcome {
                                    verdict: Verdict::Passed,
                                    assertion_count: count_lines(&output),
                                    comparison: None,
                                }
                            }
                            Err(err) => {
                                tracing::error!(target: "runner", "{}: {err}", test.path.display());
                                failed
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(target: "oracle", "{}: {err}", test.path.display());
                        failed
                    }
                }
            };

            self.finish_test(&mut report, test, outcome, start_time.elapsed(), out)?;
        }

        Ok(report)
    }

    fn finish_test(
        &self,
        report: &mut RunReport,
        test: &TestCase,
        outcome: TestOutcome,
        duration: std::time::Duration,
        out: &mut impl Write,
    ) -> Result<(), Error> {
        let label = match outcome.verdict {
            Verdict::Passed => outcome.verdict.label().green(),
            Verdict::Failed => outcome.verdict.label().bright_red(),
            Verdict::Skipped => outcome.verdict.label().cyan(),
        };

        writeln!(out, "{label}  {}", test.path.display())?;

        if self.config.verbose
            && let Some(OutputComparison::TestDiffers { expected, actual }) = &outcome.comparison
        {
            write_diff(out, 6, expected, actual)?;
        }

        report.record(
            TestResult {
                name: test.name(),
                path: test.path.clone(),
                verdict: outcome.verdict,
                duration,
            },
            outcome.assertion_count,
        );

        Ok(())
    }
}

/// Returns the expected output for a test, with `\n` line endings.
async fn expected_output(test: &TestCase, oracle: &dyn Oracle) -> ExpectedOutput {
    match artifacts::read_template(&test.template_path()) {
        Ok(Some(template)) => return ExpectedOutput::Template(normalize_line_endings(&template)),
        Ok(None) => (),
        Err(err) => {
            tracing::error!(target: "runner", "{}: {err}", test.path.display());
            return ExpectedOutput::UnreadableTemplate(err.to_string());
        }
    }

    match oracle.run(&test.path).await {
        Ok(output) => ExpectedOutput::Oracle(normalize_line_endings(&output)),
        Err(err) => {
            tracing::warn!(target: "oracle", "{}: {err}", test.path.display());
            ExpectedOutput::OracleCrash(err.to_string())
        }
    }
}

/// Completes once cancellation is requested. Never completes if the sender
/// has gone away without requesting it.
async fn wait_for_cancellation(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
