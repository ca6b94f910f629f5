//! Tests for the test runner, driven through fake targets and oracles.

#![expect(clippy::panic_in_result_fn)]

use anyhow::Result;
use assert_fs::prelude::*;
use pretty_assertions::assert_eq;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, watch};
use xcheck_harness::{
    ChannelError, ExecutionChannel, Oracle, OracleError, RunMode, RunReport, RunnerConfig,
    Session, TestCase, TestRules, TestRunner, Verdict,
};

#[derive(Clone)]
enum Behavior {
    Output(&'static str),
    Crash,
    Hang,
}

#[derive(Clone, Default)]
struct TargetLog {
    opened: usize,
    closed: usize,
    runs: Vec<PathBuf>,
}

/// Target whose response to each program is scripted.
#[derive(Clone, Default)]
struct FakeTarget {
    behaviors: Arc<Mutex<HashMap<PathBuf, Behavior>>>,
    log: Arc<Mutex<TargetLog>>,
    unreachable: bool,
}

impl FakeTarget {
    async fn respond(&self, test: &TestCase, behavior: Behavior) {
        self.behaviors
            .lock()
            .await
            .insert(test.path.clone(), behavior);
    }

    async fn snapshot(&self) -> TargetLog {
        self.log.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl ExecutionChannel for FakeTarget {
    async fn open_session(&self) -> Result<Box<dyn Session>, ChannelError> {
        if self.unreachable {
            return Err(ChannelError::Protocol(String::from("no board")));
        }

        self.log.lock().await.opened += 1;
        Ok(Box::new(FakeSession {
            target: self.clone(),
        }))
    }
}

struct FakeSession {
    target: FakeTarget,
}

#[async_trait::async_trait]
impl Session for FakeSession {
    async fn run(&mut self, source: &Path) -> Result<Vec<u8>, ChannelError> {
        self.target.log.lock().await.runs.push(source.to_path_buf());

        let behavior = self
            .target
            .behaviors
            .lock()
            .await
            .get(source)
            .cloned()
            .unwrap_or(Behavior::Output(""));

        match behavior {
            Behavior::Output(output) => Ok(output.as_bytes().to_vec()),
            Behavior::Crash => Err(ChannelError::AbnormalExit(String::from("signal: 11"))),
            Behavior::Hang => std::future::pending().await,
        }
    }

    async fn close(self: Box<Self>) -> Result<(), ChannelError> {
        self.target.log.lock().await.closed += 1;
        Ok(())
    }
}

/// Oracle whose output is the program's source text.
#[derive(Default)]
struct EchoOracle {
    crashes: HashSet<PathBuf>,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Oracle for EchoOracle {
    async fn run(&self, source: &Path) -> Result<Vec<u8>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.crashes.contains(source) {
            return Err(OracleError::Failed {
                status: String::from("exit status: 1"),
                stderr: String::new(),
            });
        }

        std::fs::read(source).map_err(|e| OracleError::Launch(source.to_path_buf(), e))
    }
}

fn test_case(dir: &assert_fs::TempDir, name: &str, source: &str) -> Result<TestCase> {
    let child = dir.child(name);
    child.write_str(source)?;

    Ok(TestCase::new(
        child.path().to_path_buf(),
        PathBuf::from(name),
        &TestRules::default(),
    ))
}

fn runner(artifacts_dir: &Path) -> TestRunner {
    TestRunner::new(RunnerConfig::default().with_artifacts_dir(artifacts_dir))
}

async fn run(
    runner: &TestRunner,
    tests: &[TestCase],
    target: &FakeTarget,
    oracle: &EchoOracle,
) -> Result<(RunReport, String)> {
    colored::control::set_override(false);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut out = vec![];
    let report = runner
        .run(tests, target, oracle, shutdown_rx, &mut out)
        .await?;

    Ok((report, String::from_utf8(out)?))
}

#[tokio::test]
async fn mixed_run() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let artifacts = assert_fs::TempDir::new()?;

    let pass = test_case(&dir, "pass.py", "1\n2\n3\n")?;
    let fail = test_case(&dir, "fail.py", "a\nb\n")?;
    let skip = test_case(&dir, "skip.py", "x\n")?;
    let crash = test_case(&dir, "crash.py", "y\n")?;

    let target = FakeTarget::default();
    target.respond(&pass, Behavior::Output("1\r\n2\r\n3\r\n")).await;
    target.respond(&fail, Behavior::Output("a\nc\n")).await;
    target.respond(&skip, Behavior::Output("SKIP\n")).await;
    target.respond(&crash, Behavior::Crash).await;

    let tests = vec![pass, fail, skip, crash];
    let (report, out) = run(&runner(artifacts.path()), &tests, &target, &EchoOracle::default()).await?;

    assert_eq!(report.verdict_count(), tests.len());
    assert_eq!(report.test_count, 3);
    assert_eq!(report.testcase_count, 3 + 2 + 1);
    assert_eq!(report.passed_count, 1);
    assert_eq!(report.failed, vec!["fail", "crash"]);
    assert_eq!(report.skipped, vec!["skip"]);
    assert!(!report.success());

    let statuses: Vec<_> = out
        .lines()
        .map(|line| line.split_whitespace().next().unwrap_or_default())
        .collect();
    assert_eq!(statuses, vec!["pass", "FAIL", "skip", "FAIL"]);

    artifacts.child("fail.py.exp").assert("a\nb\n");
    artifacts.child("fail.py.out").assert("a\nc\n");
    artifacts.child("crash.py.exp").assert("y\n");
    artifacts.child("crash.py.out").assert("CRASH");
    assert!(!artifacts.child("pass.py.exp").path().exists());
    assert!(!artifacts.child("skip.py.out").path().exists());

    let log = target.snapshot().await;
    assert_eq!((log.opened, log.closed), (1, 1));

    Ok(())
}

#[tokio::test]
async fn explicit_skip_ignores_malformed_template() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let artifacts = assert_fs::TempDir::new()?;

    let mut test = test_case(&dir, "feature.py", "")?;
    test.special = true;
    dir.child("feature.py.exp").write_str("f((\n########\n########\n[")?;

    let target = FakeTarget::default();
    target.respond(&test, Behavior::Output("SKIP\r\n")).await;

    let (report, _) = run(&runner(artifacts.path()), &[test], &target, &EchoOracle::default()).await?;

    assert_eq!(report.skipped, vec!["feature"]);
    assert!(report.success());
    assert!(!artifacts.child("feature.py.exp").path().exists());
    assert!(!artifacts.child("feature.py.out").path().exists());

    Ok(())
}

#[tokio::test]
async fn stored_template_survives_artifacts_in_test_dir() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;

    let test = test_case(&dir, "led.py", "pyb.LED(1).on()\n")?;
    let template = dir.child("led.py.exp");
    template.write_str("LED(1)\n")?;

    let target = FakeTarget::default();
    let runner = runner(dir.path());

    target.respond(&test, Behavior::Output("LED(1)\n")).await;
    let (report, _) = run(&runner, std::slice::from_ref(&test), &target, &EchoOracle::default()).await?;
    assert_eq!(report.passed_count, 1);
    template.assert("LED(1)\n");

    target.respond(&test, Behavior::Output("LED(2)\r\n")).await;
    let (report, _) = run(&runner, std::slice::from_ref(&test), &target, &EchoOracle::default()).await?;
    assert_eq!(report.failed, vec!["led"]);
    template.assert("LED(1)\n");
    dir.child("led.py.fail.exp").assert("LED(1)\n");
    dir.child("led.py.fail.out").assert("LED(2)\n");
    assert!(!dir.child("led.py.out").path().exists());

    target.respond(&test, Behavior::Output("LED(1)\n")).await;
    let (report, _) = run(&runner, std::slice::from_ref(&test), &target, &EchoOracle::default()).await?;
    assert!(report.success());
    template.assert("LED(1)\n");
    assert!(!dir.child("led.py.fail.exp").path().exists());
    assert!(!dir.child("led.py.fail.out").path().exists());

    Ok(())
}

#[tokio::test]
async fn unreadable_template_fails_only_its_test() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let artifacts = assert_fs::TempDir::new()?;

    let a = test_case(&dir, "a.py", "a\n")?;
    let b = test_case(&dir, "b.py", "b\n")?;
    let c = test_case(&dir, "c.py", "c\n")?;
    dir.child("b.py.exp").create_dir_all()?;

    let target = FakeTarget::default();
    target.respond(&a, Behavior::Output("a\n")).await;
    target.respond(&b, Behavior::Output("b\n")).await;
    target.respond(&c, Behavior::Output("c\n")).await;

    let tests = vec![a, b, c];
    let (report, out) = run(&runner(artifacts.path()), &tests, &target, &EchoOracle::default()).await?;

    assert_eq!(report.verdict_count(), 3);
    assert_eq!(report.passed_count, 2);
    assert_eq!(report.failed, vec!["b"]);
    assert_eq!(out.lines().count(), 3);
    assert_eq!(target.snapshot().await.runs.len(), 3);
    artifacts.child("b.py.exp").assert("UNREADABLE TEMPLATE");
    artifacts.child("b.py.out").assert("b\n");

    let mut summary = Vec::<u8>::new();
    report.write_summary(&mut summary)?;
    assert!(String::from_utf8(summary)?.contains("1 tests failed: b"));

    Ok(())
}

#[tokio::test]
async fn artifact_write_failure_keeps_running() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let artifacts = assert_fs::TempDir::new()?;
    let missing_dir = artifacts.path().join("missing");

    let fail = test_case(&dir, "fail.py", "x\n")?;
    let pass = test_case(&dir, "pass.py", "y\n")?;

    let target = FakeTarget::default();
    target.respond(&fail, Behavior::Output("z\n")).await;
    target.respond(&pass, Behavior::Output("y\n")).await;

    let tests = vec![fail, pass];
    let (report, _) = run(&runner(&missing_dir), &tests, &target, &EchoOracle::default()).await?;

    assert_eq!(report.failed, vec!["fail"]);
    assert_eq!(report.passed_count, 1);
    assert!(!missing_dir.exists());

    let log = target.snapshot().await;
    assert_eq!(log.runs.len(), 2);
    assert_eq!((log.opened, log.closed), (1, 1));

    Ok(())
}

#[tokio::test]
async fn preregistered_skip_runs_nothing() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let artifacts = assert_fs::TempDir::new()?;

    let mut test = test_case(&dir, "i2c.py", "x\n")?;
    test.skip = true;

    let target = FakeTarget::default();
    let oracle = EchoOracle::default();
    let (report, out) = run(&runner(artifacts.path()), &[test], &target, &oracle).await?;

    assert_eq!(report.skipped, vec!["i2c"]);
    assert_eq!(report.test_count, 0);
    assert!(out.starts_with("skip  "));
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    assert!(target.snapshot().await.runs.is_empty());

    Ok(())
}

#[tokio::test]
async fn artifacts_removed_once_test_passes() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let artifacts = assert_fs::TempDir::new()?;
    let test = test_case(&dir, "flaky.py", "ok\n")?;
    let runner = runner(artifacts.path());

    let target = FakeTarget::default();
    target.respond(&test, Behavior::Output("not ok\n")).await;

    let (report, _) = run(&runner, std::slice::from_ref(&test), &target, &EchoOracle::default()).await?;
    assert_eq!(report.failed, vec!["flaky"]);
    artifacts.child("flaky.py.exp").assert("ok\n");
    artifacts.child("flaky.py.out").assert("not ok\n");

    target.respond(&test, Behavior::Output("ok\n")).await;

    let (report, _) = run(&runner, &[test], &target, &EchoOracle::default()).await?;
    assert_eq!(report.passed_count, 1);
    assert!(!artifacts.child("flaky.py.exp").path().exists());
    assert!(!artifacts.child("flaky.py.out").path().exists());

    Ok(())
}

#[tokio::test]
async fn templates_only_normalize_special_tests() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let artifacts = assert_fs::TempDir::new()?;

    let exact = test_case(&dir, "exact.py", "")?;
    dir.child("exact.py.exp").write_str("id 0x....\n")?;

    let mut special = test_case(&dir, "special.py", "")?;
    special.special = true;
    dir.child("special.py.exp")
        .write_str("id 0x....\n########\ndone\n")?;

    let target = FakeTarget::default();
    target.respond(&exact, Behavior::Output("id 0x1234\n")).await;
    target
        .respond(&special, Behavior::Output("id 0x1234\nmem: 100\nmem: 200\ndone\n"))
        .await;

    let oracle = EchoOracle::default();
    let (report, _) = run(&runner(artifacts.path()), &[exact, special], &target, &oracle).await?;

    assert_eq!(report.failed, vec!["exact"]);
    assert_eq!(report.passed_count, 1);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    artifacts.child("exact.py.exp").assert("id 0x....\n");
    artifacts.child("exact.py.out").assert("id 0x1234\n");

    Ok(())
}

#[tokio::test]
async fn special_failure_persists_normalized_output() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let artifacts = assert_fs::TempDir::new()?;

    let mut test = test_case(&dir, "mem.py", "")?;
    test.special = true;
    dir.child("mem.py.exp").write_str("########\nX\n")?;

    let target = FakeTarget::default();
    target.respond(&test, Behavior::Output("A\nB\nC\n")).await;

    let (report, _) = run(&runner(artifacts.path()), &[test], &target, &EchoOracle::default()).await?;

    assert_eq!(report.failed, vec!["mem"]);
    artifacts.child("mem.py.out").assert("######## FAIL\nB\nC\n");

    Ok(())
}

#[tokio::test]
async fn oracle_crash_fails_test() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let artifacts = assert_fs::TempDir::new()?;
    let test = test_case(&dir, "bad.py", "")?;

    let oracle = EchoOracle {
        crashes: HashSet::from([test.path.clone()]),
        ..EchoOracle::default()
    };

    let (report, _) = run(&runner(artifacts.path()), &[test], &FakeTarget::default(), &oracle).await?;

    assert_eq!(report.failed, vec!["bad"]);
    assert_eq!(report.testcase_count, 1);
    artifacts.child("bad.py.exp").assert("ORACLE CRASH");

    Ok(())
}

#[tokio::test]
async fn cancellation_closes_session() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let artifacts = assert_fs::TempDir::new()?;

    let first = test_case(&dir, "first.py", "1\n")?;
    let hang = test_case(&dir, "hang.py", "2\n")?;
    let never = test_case(&dir, "never.py", "3\n")?;

    let target = FakeTarget::default();
    target.respond(&first, Behavior::Output("1\n")).await;
    target.respond(&hang, Behavior::Hang).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let _ = shutdown_tx.send(true);
    });

    let mut out = vec![];
    let report = runner(artifacts.path())
        .run(
            &[first, hang, never],
            &target,
            &EchoOracle::default(),
            shutdown_rx,
            &mut out,
        )
        .await?;

    assert!(report.interrupted);
    assert!(!report.success());
    assert_eq!(report.passed_count, 1);
    assert_eq!(report.verdict_count(), 1);

    let log = target.snapshot().await;
    assert_eq!(log.runs.len(), 2);
    assert_eq!((log.opened, log.closed), (1, 1));

    Ok(())
}

#[tokio::test]
async fn unreachable_target_is_fatal() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let test = test_case(&dir, "t.py", "")?;

    let target = FakeTarget {
        unreachable: true,
        ..FakeTarget::default()
    };

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let result = runner(dir.path())
        .run(&[test], &target, &EchoOracle::default(), shutdown_rx, &mut Vec::<u8>::new())
        .await;

    assert!(matches!(result, Err(xcheck_harness::Error::Channel(_))));
    Ok(())
}

#[tokio::test]
async fn record_mode_writes_missing_templates() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;

    let fresh = test_case(&dir, "fresh.py", "one\r\ntwo\n")?;
    let existing = test_case(&dir, "existing.py", "new\n")?;
    dir.child("existing.py.exp").write_str("old\n")?;

    let target = FakeTarget::default();
    let runner = TestRunner::new(
        RunnerConfig::default()
            .with_mode(RunMode::Record)
            .with_artifacts_dir(dir.path()),
    );

    let (report, _) = run(&runner, &[fresh, existing], &target, &EchoOracle::default()).await?;

    dir.child("fresh.py.exp").assert("one\ntwo\n");
    dir.child("existing.py.exp").assert("old\n");
    assert_eq!(report.passed_count, 1);
    assert_eq!(report.skipped, vec!["existing"]);
    assert_eq!(report.testcase_count, 2);

    let log = target.snapshot().await;
    assert_eq!(log.opened, 0);
    assert!(log.runs.is_empty());

    Ok(())
}

#[tokio::test]
async fn verbose_failure_prints_diff() -> Result<()> {
    let dir = assert_fs::TempDir::new()?;
    let artifacts = assert_fs::TempDir::new()?;
    let test = test_case(&dir, "v.py", "same\nexpected\n")?;

    let target = FakeTarget::default();
    target.respond(&test, Behavior::Output("same\nactual\n")).await;

    let runner = TestRunner::new(
        RunnerConfig::default()
            .with_artifacts_dir(artifacts.path())
            .with_verbose(true),
    );
    let (report, out) = run(&runner, &[test], &target, &EchoOracle::default()).await?;

    assert!(!report.success());
    assert!(out.contains("- expected"));
    assert!(out.contains("+ actual"));

    Ok(())
}

#[test]
fn verdict_labels() {
    assert_eq!(Verdict::Passed.label(), "pass");
    assert_eq!(Verdict::Failed.label(), "FAIL");
    assert_eq!(Verdict::Skipped.label(), "skip");
}
