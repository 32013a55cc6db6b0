use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, WorkflowError};

pub const CONFIG_FILE: &str = ".npm-update-pr.toml";

pub const DEFAULT_COMMIT_MESSAGE: &str = "Update NPM dependencies";
pub const DEFAULT_PR_BODY: &str = "This pull request updates the NPM dependencies \
declared in the package manifest to their latest allowed versions.\n\n\
Please review the lockfile changes and make sure the build passes before merging.\n";

/// Per-directory overrides read from `.npm-update-pr.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub update_command: Vec<String>,
    pub manifest_glob: String,
    pub commit_message: String,
    pub pr_title: String,
    /// Tera template; sees `base_branch`, `target_branch`, `changes` and `date`.
    pub pr_body: String,
    pub bot_name: String,
    pub bot_email: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            update_command: vec![String::from("npm"), String::from("update")],
            manifest_glob: String::from("package*.json"),
            commit_message: String::from(DEFAULT_COMMIT_MESSAGE),
            pr_title: String::from(DEFAULT_COMMIT_MESSAGE),
            pr_body: String::from(DEFAULT_PR_BODY),
            bot_name: String::from("github-actions[bot]"),
            bot_email: String::from("41898282+github-actions[bot]@users.noreply.github.com"),
        }
    }
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if self.update_command.is_empty() || self.update_command[0].trim().is_empty() {
            return Err(WorkflowError::Configuration(String::from(
                "update_command must name a program",
            )));
        }
        if self.manifest_glob.trim().is_empty() || self.manifest_glob.starts_with('-') {
            return Err(WorkflowError::Configuration(format!(
                "manifest_glob {:?} is not a usable pathspec",
                self.manifest_glob
            )));
        }
        if self.commit_message.trim().is_empty() || self.pr_title.trim().is_empty() {
            return Err(WorkflowError::Configuration(String::from(
                "commit_message and pr_title must not be empty",
            )));
        }
        Ok(())
    }
}

/// Load settings for `dir`, falling back to defaults when no file exists.
pub async fn load_settings(dir: &Path) -> Result<Settings> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = tokio::fs::read_to_string(&path).await.map_err(|err| {
        WorkflowError::Configuration(format!("failed to read {}: {err}", path.display()))
    })?;
    let settings: Settings = toml::from_str(&content).map_err(|err| {
        WorkflowError::Configuration(format!("failed to parse {}: {err}", path.display()))
    })?;
    settings.validate()?;
    tracing::debug!(path = %path.display(), "config: loaded");
    Ok(settings)
}
