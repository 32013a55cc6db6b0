mod actions;
mod config;
mod error;
mod git;
mod github;
mod input;
mod logging;
mod package_manager;
mod process;
mod workflow;

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use crate::error::WorkflowError;
use crate::git::GitCli;
use crate::github::{GitHubClient, RepoSlug};
use crate::input::WorkflowInput;
use crate::logging::Redactor;
use crate::package_manager::CommandPackageManager;
use crate::workflow::{UpdateWorkflow, WorkflowResult};

#[derive(Parser, Debug)]
#[command(
    name = "npm-update-pr",
    version,
    about = "Update NPM dependencies and open a pull request with the result",
    long_about = None
)]
struct Cli {
    /// Branch the pull request targets
    #[arg(long = "base-branch", env = "INPUT_BASE-BRANCH")]
    base_branch: String,

    /// Branch to create, commit to, and push
    #[arg(long = "target-branch", env = "INPUT_TARGET-BRANCH")]
    target_branch: String,

    /// Token used to open the pull request
    #[arg(long = "gh-token", env = "INPUT_GH-TOKEN", hide_env_values = true)]
    gh_token: String,

    /// Directory holding the package manifest
    #[arg(
        long = "working-directory",
        env = "INPUT_WORKING-DIRECTORY",
        default_value = "."
    )]
    working_directory: String,

    /// Verbose logging
    #[arg(long, env = "INPUT_DEBUG", default_value_t = false)]
    debug: bool,

    /// owner/name of the GitHub repository; inferred from origin when absent
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,

    /// GitHub API base URL, for GitHub Enterprise
    #[arg(long = "api-url", env = "GITHUB_API_URL")]
    api_url: Option<String>,

    /// Detect updates without committing, pushing, or opening a pull request
    #[arg(long = "dry-run", default_value_t = false)]
    dry_run: bool,

    /// Deadline in seconds for each external command and the API call
    #[arg(long = "step-timeout", value_name = "SECS")]
    step_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let input = WorkflowInput::new(
        cli.base_branch.clone(),
        cli.target_branch.clone(),
        cli.gh_token.clone(),
        cli.working_directory.clone(),
    );
    if actions::running_in_actions() && !cli.gh_token.is_empty() {
        // Consumed by the runner, never shown in the job log.
        println!("{}", actions::mask_command(&cli.gh_token));
    }
    let redactor = Redactor::new([input.credential.clone()]);
    logging::init(cli.debug, redactor.clone()).context("failed to initialise logging")?;

    let result = execute(&cli, &input).await?;
    report(&result, &redactor).await?;

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn execute(cli: &Cli, input: &WorkflowInput) -> Result<WorkflowResult> {
    // Nothing below may touch the working directory until it is known to be safe.
    if let Err(err) = input.validate() {
        return Ok(failed(err));
    }

    let settings = match config::load_settings(input.working_dir()).await {
        Ok(settings) => settings,
        Err(err) => return Ok(failed(err)),
    };
    let repository = match resolve_repository(cli, input.working_dir()).await {
        Ok(repository) => repository,
        Err(err) => return Ok(failed(err)),
    };

    let timeout = cli.step_timeout.map(Duration::from_secs);
    let package_manager = match CommandPackageManager::new(&settings.update_command, timeout) {
        Ok(pm) => pm,
        Err(err) => return Ok(failed(err)),
    };
    let vcs = GitCli::new(timeout);
    let code_host = GitHubClient::new(&input.credential, cli.api_url.as_deref(), timeout);

    let workflow = UpdateWorkflow::new(&package_manager, &vcs, &code_host)
        .settings(settings)
        .repository(repository)
        .dry_run(cli.dry_run);
    Ok(workflow.run(input).await)
}

fn failed(err: WorkflowError) -> WorkflowResult {
    tracing::error!(kind = err.kind(), "{err}");
    WorkflowResult::Failed(err)
}

/// An explicit `--repository` must parse; otherwise fall back to the origin
/// remote and leave the decision to the publish step.
async fn resolve_repository(
    cli: &Cli,
    dir: &Path,
) -> std::result::Result<Option<RepoSlug>, WorkflowError> {
    if let Some(slug) = cli.repository.as_deref().filter(|s| !s.is_empty()) {
        return slug
            .parse::<RepoSlug>()
            .map(Some)
            .map_err(|err| WorkflowError::Configuration(format!("--repository: {err}")));
    }
    match RepoSlug::from_origin(dir).await {
        Ok(slug) => {
            tracing::debug!(%slug, "repository inferred from origin");
            Ok(Some(slug))
        }
        Err(err) => {
            tracing::debug!("repository not inferred: {err:#}");
            Ok(None)
        }
    }
}

async fn report(result: &WorkflowResult, redactor: &Redactor) -> Result<()> {
    match result {
        WorkflowResult::NoUpdatesFound => println!("no updates found"),
        WorkflowResult::UpdatesDetected(changes) => {
            println!("dry-run: updates detected\n{changes}")
        }
        WorkflowResult::PullRequestCreated(url) => println!("pull request created: {url}"),
        WorkflowResult::Failed(err) => {
            println!(
                "{}",
                actions::error_annotation(&redactor.redact(&err.to_string()))
            )
        }
    }

    if let Some(path) = std::env::var_os("GITHUB_OUTPUT").filter(|p| !p.is_empty()) {
        actions::write_step_outputs(Path::new(&path), result)
            .await
            .context("failed to record step outputs")?;
    }
    Ok(())
}
