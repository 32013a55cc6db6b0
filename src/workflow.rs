use chrono::Utc;
use tera::{Context as TeraContext, Tera};

use crate::config::Settings;
use crate::error::{Result, WorkflowError};
use crate::git::VersionControl;
use crate::github::{CodeHostClient, NewPullRequest, RepoSlug};
use crate::input::WorkflowInput;
use crate::package_manager::PackageManager;

pub const REMOTE: &str = "origin";

/// Outcome of one invocation.
#[derive(Debug)]
pub enum WorkflowResult {
    NoUpdatesFound,
    /// Dry run only: manifests changed, nothing was published.
    UpdatesDetected(String),
    PullRequestCreated(String),
    Failed(WorkflowError),
}

impl WorkflowResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, WorkflowResult::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkflowResult::NoUpdatesFound => "no-updates",
            WorkflowResult::UpdatesDetected(_) => "updates-detected",
            WorkflowResult::PullRequestCreated(_) => "created",
            WorkflowResult::Failed(_) => "failed",
        }
    }
}

/// Update manifests, and when they change publish them as a pull request.
pub struct UpdateWorkflow<'a> {
    package_manager: &'a dyn PackageManager,
    vcs: &'a dyn VersionControl,
    code_host: &'a dyn CodeHostClient,
    settings: Settings,
    repository: Option<RepoSlug>,
    dry_run: bool,
}

impl<'a> UpdateWorkflow<'a> {
    pub fn new(
        package_manager: &'a dyn PackageManager,
        vcs: &'a dyn VersionControl,
        code_host: &'a dyn CodeHostClient,
    ) -> Self {
        Self {
            package_manager,
            vcs,
            code_host,
            settings: Settings::default(),
            repository: None,
            dry_run: false,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn repository(mut self, repository: Option<RepoSlug>) -> Self {
        self.repository = repository;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self, input: &WorkflowInput) -> WorkflowResult {
        match self.try_run(input).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(kind = err.kind(), "{err}");
                WorkflowResult::Failed(err)
            }
        }
    }

    async fn try_run(&self, input: &WorkflowInput) -> Result<WorkflowResult> {
        input.validate()?;
        let cwd = input.working_dir();
        let glob = self.settings.manifest_glob.as_str();

        self.package_manager.update(cwd).await?;

        let status = self.vcs.status_short(cwd, glob).await?;
        let changes = status.trim();
        if changes.is_empty() {
            tracing::info!(dir = %input.working_directory, "no dependency updates found");
            return Ok(WorkflowResult::NoUpdatesFound);
        }
        tracing::info!("manifest changes detected:\n{changes}");

        if self.dry_run {
            tracing::info!(target_branch = %input.target_branch, "dry-run: skipping publish");
            return Ok(WorkflowResult::UpdatesDetected(changes.to_string()));
        }

        let repo = self.repository.as_ref().ok_or_else(|| {
            WorkflowError::Configuration(String::from(
                "cannot determine the GitHub repository; pass --repository owner/name",
            ))
        })?;
        let body = self.render_body(input, changes)?;

        self.vcs
            .configure_identity(cwd, &self.settings.bot_name, &self.settings.bot_email)
            .await?;
        self.vcs.create_branch(cwd, &input.target_branch).await?;
        self.vcs.add(cwd, glob).await?;
        self.vcs
            .commit(cwd, &self.settings.commit_message, glob)
            .await?;
        self.vcs.push(cwd, REMOTE, &input.target_branch).await?;
        tracing::info!(branch = %input.target_branch, remote = REMOTE, "pushed update branch");

        // The branch stays on the remote even if this call fails.
        let url = self
            .code_host
            .create_pull_request(NewPullRequest {
                owner: repo.owner.clone(),
                repo: repo.name.clone(),
                title: self.settings.pr_title.clone(),
                body,
                base: input.base_branch.clone(),
                head: input.target_branch.clone(),
            })
            .await?;
        tracing::info!(%url, "pull request created");
        Ok(WorkflowResult::PullRequestCreated(url))
    }

    fn render_body(&self, input: &WorkflowInput, changes: &str) -> Result<String> {
        let mut ctx = TeraContext::new();
        ctx.insert("base_branch", &input.base_branch);
        ctx.insert("target_branch", &input.target_branch);
        ctx.insert("changes", changes);
        ctx.insert("date", &Utc::now().format("%Y-%m-%d").to_string());
        Tera::one_off(&self.settings.pr_body, &ctx, false).map_err(|err| {
            WorkflowError::Configuration(format!("failed to render pr_body template: {err}"))
        })
    }
}
