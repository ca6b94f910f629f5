//! Implements the command-line interface for `xcheck`.

mod args;
mod events;

use crate::args::{CommandLineArgs, TargetKind};
use anyhow::Context;
use clap::Parser;
use std::io::Write;
use xcheck_harness::{
    ExecutionChannel, LocalInterpreter, ProcessOracle, RawReplChannel, RunnerConfig, TestRules,
    TestRunner,
};

/// Main entry point for `xcheck`.
fn main() {
    //
    // Set up panic handler. On release builds, it will capture panic details to a
    // temporary .toml file and report a human-readable message to the screen.
    //
    human_panic::setup_panic!(
        human_panic::Metadata::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
            .homepage(env!("CARGO_PKG_REPOSITORY"))
    );

    let args = match CommandLineArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();

            // clap reports `--help` and `--version` as errors too.
            let exit_code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };

            std::process::exit(exit_code);
        }
    };

    events::init(&args.enabled_trace_events);

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")
        .and_then(|runtime| runtime.block_on(run(args)));

    let exit_code = match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            tracing::error!("error: {err:#}");
            1
        }
    };

    std::process::exit(exit_code);
}

/// Runs the selected tests. Returns whether every test that ran passed.
///
/// # Arguments
///
/// * `args` - The parsed command-line arguments.
async fn run(args: CommandLineArgs) -> anyhow::Result<bool> {
    let manifest = xcheck_harness::load_manifest(args.config.as_deref())?;
    let manifest = args.apply_to(manifest);

    let rules = TestRules::new(&manifest.tests)?;
    let tests = xcheck_harness::discover_tests(&args.test_paths, &manifest.tests.extension, &rules)?;

    let mut stdout = std::io::stdout();

    if args.list {
        for test in &tests {
            let tag = if test.skip {
                " (skip)"
            } else if test.special {
                " (special)"
            } else {
                ""
            };

            writeln!(stdout, "{}{tag}", test.path.display())?;
        }

        return Ok(true);
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted; stopping");
            let _ = shutdown_tx.send(true);
        }
    });

    let channel: Box<dyn ExecutionChannel> = match args.target {
        TargetKind::Local => Box::new(LocalInterpreter::new(
            manifest.target.clone(),
            args.keep_path,
        )),
        TargetKind::RawRepl => {
            let device = args
                .device
                .clone()
                .context("--device is required for the raw-repl target")?;
            Box::new(RawReplChannel::new(device, manifest.target.timeout()))
        }
    };

    let oracle = ProcessOracle::new(manifest.oracle.clone());

    let runner = TestRunner::new(
        RunnerConfig::default()
            .with_mode(args.run_mode())
            .with_artifacts_dir(&args.artifacts_dir)
            .with_verbose(args.verbose),
    );

    let report = runner
        .run(&tests, channel.as_ref(), &oracle, shutdown_rx, &mut stdout)
        .await?;

    report.write_summary(&mut stdout)?;

    if let Some(junit_path) = &args.junit {
        let file = std::fs::File::create(junit_path)
            .with_context(|| format!("failed to create {}", junit_path.display()))?;
        report.write_junit(std::io::BufWriter::new(file))?;
    }

    Ok(report.success())
}
