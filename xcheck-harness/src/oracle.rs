//! Reference interpreter used to compute expected output.

use crate::config::OracleConfig;
use crate::error::OracleError;
use std::path::Path;

/// Computes the expected output of a test program.
#[async_trait::async_trait]
pub trait Oracle: Send + Sync {
    /// Runs the given source and returns its standard output.
    ///
    /// # Arguments
    ///
    /// * `source` - Path to the program's source.
    async fn run(&self, source: &Path) -> Result<Vec<u8>, OracleError>;
}

/// Oracle backed by a reference interpreter process on the host.
#[derive(Clone, Debug)]
pub struct ProcessOracle {
    config: OracleConfig,
}

impl ProcessOracle {
    /// Creates an oracle from the given configuration.
    pub const fn new(config: OracleConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Oracle for ProcessOracle {
    async fn run(&self, source: &Path) -> Result<Vec<u8>, OracleError> {
        tracing::debug!(
            target: "oracle",
            "running {} on {}",
            self.config.program.display(),
            source.display()
        );

        let output = tokio::process::Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(source)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| OracleError::Launch(self.config.program.clone(), e))?;

        if !output.status.success() {
            return Err(OracleError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(output.stdout)
    }
}
