//! GitHub Actions plumbing: step outputs, error annotations and log masking.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use crate::workflow::WorkflowResult;

/// Escape a value for use as the message of a workflow command.
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// `::error::` line that makes the runner surface the failure reason.
pub fn error_annotation(message: &str) -> String {
    format!("::error::{}", escape_data(message))
}

/// Whether the process runs as a GitHub Actions step.
pub fn running_in_actions() -> bool {
    std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true")
}

/// `::add-mask::` line asking the runner to hide `secret` in every later log
/// line of the job, including output of child processes.
pub fn mask_command(secret: &str) -> String {
    format!("::add-mask::{}", escape_data(secret))
}

/// Render `name=value` step outputs for `result`.
pub fn step_outputs(result: &WorkflowResult) -> Vec<(&'static str, String)> {
    let mut outputs = vec![("result", result.label().to_string())];
    if let WorkflowResult::PullRequestCreated(url) = result {
        outputs.push(("pull-request-url", url.clone()));
    }
    if let WorkflowResult::Failed(err) = result {
        outputs.push(("error-kind", err.kind().to_string()));
    }
    outputs
}

/// Append the outputs of `result` to the file named by `GITHUB_OUTPUT`.
pub async fn write_step_outputs(path: &Path, result: &WorkflowResult) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut buf = String::new();
    for (name, value) in step_outputs(result) {
        // Values are single-line by construction; keep it that way.
        buf.push_str(&format!("{name}={}\n", value.replace(['\r', '\n'], " ")));
    }
    file.write_all(buf.as_bytes())
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;

    #[test]
    fn escapes_multiline_messages() {
        assert_eq!(
            error_annotation("push failed: 100%\nrejected"),
            "::error::push failed: 100%25%0Arejected"
        );
    }

    #[test]
    fn mask_command_keeps_the_secret_on_one_line() {
        assert_eq!(mask_command("ghp_abc"), "::add-mask::ghp_abc");
        assert_eq!(mask_command("a\nb%"), "::add-mask::a%0Ab%25");
    }

    #[tokio::test]
    async fn appends_outputs_for_created_pull_request() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("github_output");
        std::fs::write(&path, "earlier=1\n").unwrap();

        let result = WorkflowResult::PullRequestCreated(String::from(
            "https://github.com/octo/widgets/pull/7",
        ));
        write_step_outputs(&path, &result).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "earlier=1\nresult=created\npull-request-url=https://github.com/octo/widgets/pull/7\n"
        );
    }

    #[test]
    fn failed_results_carry_the_error_kind() {
        let result = WorkflowResult::Failed(WorkflowError::PullRequestCreation(String::from(
            "Validation Failed",
        )));
        assert_eq!(
            step_outputs(&result),
            vec![
                ("result", String::from("failed")),
                ("error-kind", String::from("pull-request-creation")),
            ]
        );
    }
}
