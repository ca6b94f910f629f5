//! Execution channel that runs tests with a local interpreter binary.

use crate::channel::{ExecutionChannel, Session};
use crate::config::TargetConfig;
use crate::error::ChannelError;
use std::path::Path;

/// Runs each test as `<interpreter> [args...] <source>` on the host.
#[derive(Clone, Debug)]
pub struct LocalInterpreter {
    config: TargetConfig,
    keep_search_path: bool,
}

impl LocalInterpreter {
    /// Creates a channel for the given target configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Interpreter path, arguments, and timeout.
    /// * `keep_search_path` - Whether to pass the host's module search path
    ///   variable through to the interpreter instead of clearing it.
    pub const fn new(config: TargetConfig, keep_search_path: bool) -> Self {
        Self {
            config,
            keep_search_path,
        }
    }

    fn create_command(&self, source: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.config.interpreter);
        cmd.args(&self.config.args)
            .arg(source)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        // Make sure tests only see the interpreter's built-in modules.
        if !self.keep_search_path
            && let Some(var) = &self.config.search_path_var
        {
            cmd.env(var, "");
        }

        cmd
    }
}

#[async_trait::async_trait]
impl ExecutionChannel for LocalInterpreter {
    async fn open_session(&self) -> Result<Box<dyn Session>, ChannelError> {
        tracing::debug!(
            target: "channel",
            "using local interpreter {}",
            self.config.interpreter.display()
        );

        Ok(Box::new(LocalSession {
            channel: self.clone(),
        }))
    }
}

struct LocalSession {
    channel: LocalInterpreter,
}

#[async_trait::async_trait]
impl Session for LocalSession {
    async fn run(&mut self, source: &Path) -> Result<Vec<u8>, ChannelError> {
        let mut cmd = self.channel.create_command(source);
        let timeout = self.channel.config.timeout();

        let child_output = cmd.output();
        let output = match tokio::time::timeout(timeout, child_output).await {
            Ok(result) => {
                result.map_err(|e| ChannelError::Launch(self.channel.config.interpreter.clone(), e))?
            }
            // Dropping the future kills the child.
            Err(_) => return Err(ChannelError::Timeout(timeout)),
        };

        // A normal non-zero exit (e.g. an uncaught exception) still produced
        // meaningful output; only death by signal counts as a crash.
        if output.status.code().is_none() {
            return Err(ChannelError::AbnormalExit(output.status.to_string()));
        }

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        Ok(combined)
    }

    async fn close(self: Box<Self>) -> Result<(), ChannelError> {
        Ok(())
    }
}
