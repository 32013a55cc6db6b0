use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use git2::Repository;
use octocrab::Octocrab;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{Result, WorkflowError};

/// Everything needed to open one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub owner: String,
    pub repo: String,
    pub title: String,
    pub body: String,
    pub base: String,
    pub head: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeHostClient: Send + Sync {
    /// Open a pull request and return its web URL.
    async fn create_pull_request(&self, request: NewPullRequest) -> Result<String>;
}

/// [`CodeHostClient`] talking to the GitHub REST API. The HTTP client is
/// only built when a pull request is actually opened.
pub struct GitHubClient {
    token: SecretString,
    api_url: Option<String>,
    timeout: Option<Duration>,
}

impl GitHubClient {
    /// `api_url` overrides the public API endpoint for GitHub Enterprise.
    pub fn new(token: &SecretString, api_url: Option<&str>, timeout: Option<Duration>) -> Self {
        Self {
            token: token.clone(),
            api_url: api_url.filter(|u| !u.is_empty()).map(str::to_string),
            timeout,
        }
    }

    fn octocrab(&self) -> anyhow::Result<Octocrab> {
        let mut builder =
            Octocrab::builder().personal_token(self.token.expose_secret().to_string());
        if let Some(url) = &self.api_url {
            builder = builder
                .base_uri(url.as_str())
                .with_context(|| format!("invalid GitHub API url {url}"))?;
        }
        builder.build().context("failed to build GitHub client")
    }

    async fn send(&self, request: &NewPullRequest) -> Result<String> {
        let octocrab = self
            .octocrab()
            .map_err(|err| WorkflowError::PullRequestCreation(format!("{err:#}")))?;
        let pr = octocrab
            .pulls(&request.owner, &request.repo)
            .create(&request.title, &request.head, &request.base)
            .body(&request.body)
            .send()
            .await
            .map_err(|err| WorkflowError::PullRequestCreation(api_error_message(&err)))?;

        pr.html_url
            .map(|url| url.to_string())
            .ok_or_else(|| {
                WorkflowError::PullRequestCreation(format!(
                    "GitHub returned pull request #{} without an html_url",
                    pr.number
                ))
            })
    }
}

#[async_trait]
impl CodeHostClient for GitHubClient {
    async fn create_pull_request(&self, request: NewPullRequest) -> Result<String> {
        tracing::info!(
            repo = %format!("{}/{}", request.owner, request.repo),
            base = %request.base,
            head = %request.head,
            "opening pull request"
        );
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.send(&request))
                .await
                .map_err(|_| {
                    WorkflowError::PullRequestCreation(format!(
                        "GitHub did not respond within {limit:?}"
                    ))
                })?,
            None => self.send(&request).await,
        }
    }
}

/// Prefer the message GitHub put in the response body over the transport
/// wrapper's description.
fn api_error_message(err: &octocrab::Error) -> String {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let mut message = source.message.clone();
            if let Some(details) = source.errors.as_ref().filter(|e| !e.is_empty()) {
                let rendered: Vec<String> = details.iter().map(|d| d.to_string()).collect();
                message = format!("{message} ({})", rendered.join("; "));
            }
            message
        }
        other => other.to_string(),
    }
}

/// `owner/name` of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoSlug {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (owner, name) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| anyhow!("expected owner/name, got {s:?}"))?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(anyhow!("expected owner/name, got {s:?}"));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl RepoSlug {
    /// Parse a GitHub remote URL in SSH or HTTPS form.
    pub fn from_remote_url(url: &str) -> anyhow::Result<Self> {
        let ssh = Regex::new(
            r"^(?:ssh://)?git@[^:/]+[:/](?P<owner>[^/]+)/(?P<repo>[^/]+?)(?:\.git)?/?$",
        )?;
        let https = Regex::new(
            r"^https?://(?:[^@/]+@)?[^/]+/(?P<owner>[^/]+)/(?P<repo>[^/]+?)(?:\.git)?/?$",
        )?;
        let caps = ssh
            .captures(url)
            .or_else(|| https.captures(url))
            .ok_or_else(|| anyhow!("unsupported remote URL (expected GitHub): {url}"))?;
        Ok(Self {
            owner: caps["owner"].to_string(),
            name: caps["repo"].to_string(),
        })
    }

    /// Read the `origin` remote of the repository containing `dir`.
    pub async fn from_origin(dir: &Path) -> anyhow::Result<Self> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let repo = Repository::discover(&dir)
                .with_context(|| format!("{} is not inside a git repository", dir.display()))?;
            let remote = repo
                .find_remote("origin")
                .context("repository has no origin remote")?;
            let url = remote
                .url()
                .ok_or_else(|| anyhow!("origin remote has no URL"))?;
            Self::from_remote_url(url)
        })
        .await
        .map_err(|e| anyhow!("origin lookup task join error: {}", e))?
    }
}
