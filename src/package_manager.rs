use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, WorkflowError};
use crate::process;

/// Rewrites the manifest files in `cwd` to pick up newer dependency versions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageManager: Send + Sync {
    async fn update(&self, cwd: &Path) -> Result<()>;
}

/// Runs a configured update command such as `npm update`.
#[derive(Debug, Clone)]
pub struct CommandPackageManager {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandPackageManager {
    /// Build from an argv-style command; the first element is the program.
    pub fn new(command: &[String], timeout: Option<Duration>) -> Result<Self> {
        let (program, args) = command.split_first().ok_or_else(|| {
            WorkflowError::Configuration(String::from("update_command must not be empty"))
        })?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }
}

#[async_trait]
impl PackageManager for CommandPackageManager {
    async fn update(&self, cwd: &Path) -> Result<()> {
        tracing::info!(program = %self.program, args = ?self.args, "updating dependencies");
        let output = process::run_in(cwd, &self.program, &self.args, self.timeout)
            .await
            .map_err(|err| WorkflowError::PackageManager(err.to_string()))?;
        for stream in [&output.stdout, &output.stderr] {
            if !stream.trim().is_empty() {
                tracing::debug!("{}", stream.trim_end());
            }
        }
        Ok(())
    }
}
