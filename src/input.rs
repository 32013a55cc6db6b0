use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use secrecy::SecretString;

use crate::error::{Result, WorkflowError};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-./]+$").expect("static pattern"));

const CHARSET_REASON: &str =
    "only letters, digits, '_', '-', '.' and '/' are allowed (and it must not be empty)";
const LEADING_DASH_REASON: &str = "a branch name must not start with '-'";

/// Inputs of a single workflow invocation.
#[derive(Debug, Clone)]
pub struct WorkflowInput {
    pub base_branch: String,
    pub target_branch: String,
    pub credential: SecretString,
    pub working_directory: String,
}

impl WorkflowInput {
    pub fn new(
        base_branch: impl Into<String>,
        target_branch: impl Into<String>,
        credential: impl Into<String>,
        working_directory: impl Into<String>,
    ) -> Self {
        Self {
            base_branch: base_branch.into(),
            target_branch: target_branch.into(),
            credential: SecretString::from(credential.into()),
            working_directory: working_directory.into(),
        }
    }

    /// Check every name-bearing input. The first offending input is reported.
    pub fn validate(&self) -> Result<()> {
        validate_branch("base-branch", &self.base_branch)?;
        validate_branch("target-branch", &self.target_branch)?;
        validate_name("working-directory", &self.working_directory)?;
        Ok(())
    }

    pub fn working_dir(&self) -> &Path {
        Path::new(&self.working_directory)
    }
}

/// True when `value` consists only of the characters allowed in branch and
/// directory names.
pub fn is_safe_name(value: &str) -> bool {
    NAME_RE.is_match(value)
}

fn validate_name(input: &'static str, value: &str) -> Result<()> {
    if is_safe_name(value) {
        return Ok(());
    }
    Err(WorkflowError::InvalidInput {
        input,
        value: value.to_string(),
        reason: CHARSET_REASON,
    })
}

fn validate_branch(input: &'static str, value: &str) -> Result<()> {
    validate_name(input, value)?;
    if value.starts_with('-') {
        return Err(WorkflowError::InvalidInput {
            input,
            value: value.to_string(),
            reason: LEADING_DASH_REASON,
        });
    }
    Ok(())
}
