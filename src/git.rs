use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, WorkflowError};
use crate::process::{self, CommandOutput};

/// Git operations the workflow needs, each scoped to a working directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// `git status --short` limited to paths matching `pathspec`.
    async fn status_short(&self, cwd: &Path, pathspec: &str) -> Result<String>;

    /// Author for the commits this instance makes. Nothing is written to any
    /// git config file.
    async fn configure_identity(&self, cwd: &Path, name: &str, email: &str) -> Result<()>;

    async fn create_branch(&self, cwd: &Path, name: &str) -> Result<()>;

    async fn add(&self, cwd: &Path, pathspec: &str) -> Result<()>;

    /// Commit only the paths matching `pathspec`; anything else already in
    /// the index stays staged and out of the commit.
    async fn commit(&self, cwd: &Path, message: &str, pathspec: &str) -> Result<()>;

    async fn push(&self, cwd: &Path, remote: &str, branch: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    name: String,
    email: String,
}

/// [`VersionControl`] backed by the `git` executable.
#[derive(Debug, Default)]
pub struct GitCli {
    timeout: Option<Duration>,
    identity: Mutex<Option<Identity>>,
}

impl GitCli {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            identity: Mutex::new(None),
        }
    }

    async fn git(&self, cwd: &Path, args: &[&str]) -> Result<CommandOutput> {
        process::run_in(cwd, "git", args, self.timeout)
            .await
            .map_err(|err| WorkflowError::VersionControl(err.to_string()))
    }

    fn identity(&self) -> Result<MutexGuard<'_, Option<Identity>>> {
        self.identity
            .lock()
            .map_err(|_| WorkflowError::VersionControl(String::from("identity lock poisoned")))
    }

    /// `-c user.name=... -c user.email=...` for the configured identity.
    fn identity_args(&self) -> Result<Vec<String>> {
        Ok(match self.identity()?.as_ref() {
            Some(id) => vec![
                String::from("-c"),
                format!("user.name={}", id.name),
                String::from("-c"),
                format!("user.email={}", id.email),
            ],
            None => Vec::new(),
        })
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn status_short(&self, cwd: &Path, pathspec: &str) -> Result<String> {
        let out = self.git(cwd, &["status", "--short", "--", pathspec]).await?;
        Ok(out.stdout)
    }

    async fn configure_identity(&self, _cwd: &Path, name: &str, email: &str) -> Result<()> {
        *self.identity()? = Some(Identity {
            name: name.to_string(),
            email: email.to_string(),
        });
        Ok(())
    }

    async fn create_branch(&self, cwd: &Path, name: &str) -> Result<()> {
        self.git(cwd, &["checkout", "-b", name]).await?;
        Ok(())
    }

    async fn add(&self, cwd: &Path, pathspec: &str) -> Result<()> {
        self.git(cwd, &["add", "--", pathspec]).await?;
        Ok(())
    }

    async fn commit(&self, cwd: &Path, message: &str, pathspec: &str) -> Result<()> {
        let identity = self.identity_args()?;
        let mut args: Vec<&str> = identity.iter().map(String::as_str).collect();
        args.extend(["commit", "-m", message, "--", pathspec]);
        self.git(cwd, &args).await?;
        Ok(())
    }

    async fn push(&self, cwd: &Path, remote: &str, branch: &str) -> Result<()> {
        self.git(cwd, &["push", remote, branch]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use git2::{IndexAddOption, Repository, Signature};

    use super::*;

    fn init_repo(root: &Path) -> Repository {
        fs::write(root.join("package.json"), "{\"name\":\"foo\"}\n").unwrap();
        fs::write(root.join("README.md"), "foo\n").unwrap();
        let repo = Repository::init(root).unwrap();
        {
            let mut idx = repo.index().unwrap();
            idx.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
                .unwrap();
            idx.write().unwrap();
            let oid = idx.write_tree().unwrap();
            let tree = repo.find_tree(oid).unwrap();
            let sig = Signature::now("fixture", "fixture@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
                .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn status_is_limited_to_the_pathspec() {
        let td = tempfile::tempdir().unwrap();
        let _repo = init_repo(td.path());
        let git = GitCli::default();

        fs::write(td.path().join("README.md"), "changed\n").unwrap();
        let status = git.status_short(td.path(), "package*.json").await.unwrap();
        assert!(status.trim().is_empty(), "unexpected status: {status}");

        fs::write(td.path().join("package.json"), "{\"name\":\"bar\"}\n").unwrap();
        fs::write(td.path().join("package-lock.json"), "{}\n").unwrap();
        let status = git.status_short(td.path(), "package*.json").await.unwrap();
        assert!(status.contains("package.json"), "{status}");
        assert!(status.contains("package-lock.json"), "{status}");
        assert!(!status.contains("README.md"), "{status}");
    }

    #[tokio::test]
    async fn publishes_branch_to_origin() {
        let td = tempfile::tempdir().unwrap();
        let remote_dir = tempfile::tempdir().unwrap();
        Repository::init_bare(remote_dir.path()).unwrap();
        let repo = init_repo(td.path());
        repo.remote("origin", remote_dir.path().to_str().unwrap())
            .unwrap();

        let git = GitCli::default();
        fs::write(td.path().join("package.json"), "{\"name\":\"bar\"}\n").unwrap();
        fs::write(td.path().join("README.md"), "unrelated\n").unwrap();

        git.configure_identity(td.path(), "bot", "bot@example.com")
            .await
            .unwrap();
        git.create_branch(td.path(), "deps/update-1").await.unwrap();
        git.add(td.path(), "package*.json").await.unwrap();
        git.commit(td.path(), "Update NPM dependencies", "package*.json")
            .await
            .unwrap();
        git.push(td.path(), "origin", "deps/update-1").await.unwrap();

        // The identity only lives on the commit command line.
        let cfg = repo
            .config()
            .unwrap()
            .open_level(git2::ConfigLevel::Local)
            .unwrap();
        assert!(cfg.get_string("user.name").is_err());
        assert!(cfg.get_string("user.email").is_err());

        let remote = Repository::open_bare(remote_dir.path()).unwrap();
        let pushed = remote
            .find_branch("deps/update-1", git2::BranchType::Local)
            .unwrap();
        let commit = pushed.get().peel_to_commit().unwrap();
        assert_eq!(commit.message(), Some("Update NPM dependencies\n"));
        assert_eq!(commit.author().name(), Some("bot"));
        assert_eq!(commit.author().email(), Some("bot@example.com"));

        // Only the manifest was staged; the unrelated edit stays in the tree.
        let status = git.status_short(td.path(), "README.md").await.unwrap();
        assert!(status.contains("README.md"), "{status}");
    }

    #[tokio::test]
    async fn commit_leaves_other_staged_files_out() {
        let td = tempfile::tempdir().unwrap();
        let repo = init_repo(td.path());
        let git = GitCli::default();
        git.configure_identity(td.path(), "bot", "bot@example.com")
            .await
            .unwrap();

        // Someone staged README.md before the workflow ran.
        fs::write(td.path().join("README.md"), "staged elsewhere\n").unwrap();
        git.add(td.path(), "README.md").await.unwrap();

        fs::write(td.path().join("package.json"), "{\"name\":\"bar\"}\n").unwrap();
        git.add(td.path(), "package*.json").await.unwrap();
        git.commit(td.path(), "Update NPM dependencies", "package*.json")
            .await
            .unwrap();

        let head = repo.head().unwrap().peel_to_commit().unwrap();
        let parent = head.parent(0).unwrap();
        let (old_tree, new_tree) = (parent.tree().unwrap(), head.tree().unwrap());
        let diff = repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)
            .unwrap();
        let changed: Vec<_> = diff
            .deltas()
            .filter_map(|d| d.new_file().path().map(|p| p.to_path_buf()))
            .collect();
        assert_eq!(changed, vec![std::path::PathBuf::from("package.json")]);

        // README.md is still staged for whoever staged it.
        let status = git.status_short(td.path(), "README.md").await.unwrap();
        assert!(status.starts_with("M "), "{status:?}");
    }

    #[tokio::test]
    async fn failures_are_version_control_errors() {
        let td = tempfile::tempdir().unwrap();
        let _repo = init_repo(td.path());
        let git = GitCli::default();
        let err = git.push(td.path(), "origin", "nowhere").await.unwrap_err();
        assert!(matches!(err, WorkflowError::VersionControl(_)), "{err}");
    }
}
