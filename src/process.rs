use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Exit {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("`{command}` did not finish within {}s", .timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },
}

#[derive(Debug, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with an explicit argument list inside `dir`. No shell is
/// involved, so arguments reach the program verbatim.
pub async fn run_in<I, S>(
    dir: &Path,
    program: &str,
    args: I,
    timeout: Option<Duration>,
) -> Result<CommandOutput, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args
        .into_iter()
        .map(|a| a.as_ref().to_os_string())
        .collect();
    let command = describe(program, &args);
    tracing::debug!(dir = %dir.display(), %command, "process: spawn");

    let child = Command::new(program)
        .current_dir(dir)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            command: command.clone(),
            source,
        })?;

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| ProcessError::TimedOut {
                command: command.clone(),
                timeout: limit,
            })?,
        None => child.wait_with_output().await,
    }
    .map_err(|source| ProcessError::Spawn {
        command: command.clone(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(ProcessError::Exit {
            command,
            status: output.status,
            stderr: stderr.trim().to_string(),
        });
    }
    tracing::trace!(%command, stdout = %stdout.trim_end(), "process: done");
    Ok(CommandOutput { stdout, stderr })
}

fn describe(program: &str, args: &[std::ffi::OsString]) -> String {
    let mut out = String::from(program);
    for arg in args {
        out.push(' ');
        out.push_str(&arg.to_string_lossy());
    }
    out
}
