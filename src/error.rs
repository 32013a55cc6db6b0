use thiserror::Error;

/// Terminal failure of a workflow invocation. None of these are retried.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("invalid {input} {value:?}: {reason}")]
    InvalidInput {
        input: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("package manager failed: {0}")]
    PackageManager(String),

    #[error("version control failed: {0}")]
    VersionControl(String),

    #[error("pull request creation failed: {0}")]
    PullRequestCreation(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl WorkflowError {
    /// Stable identifier used in step outputs and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::InvalidInput { .. } => "invalid-input",
            WorkflowError::PackageManager(_) => "package-manager",
            WorkflowError::VersionControl(_) => "version-control",
            WorkflowError::PullRequestCreation(_) => "pull-request-creation",
            WorkflowError::Configuration(_) => "configuration",
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
