//! Asynchronous `git` CLI client.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::errors::GitError;

/// The git operations a rebase needs.
///
/// [`GitCli`] drives the real binary; tests substitute a scripted fake.
#[allow(async_fn_in_trait)]
pub trait RebaseTool {
    /// Run `git rebase <args>`. Returns the combined output on success and
    /// an error when git exits non-zero (which is how conflicts surface).
    async fn rebase(&self, args: &[&str]) -> Result<String, GitError>;

    /// Files with unmerged paths, most recently listed first.
    async fn conflicted_files(&self) -> Result<Vec<PathBuf>, GitError>;

    /// Stage every change in the working tree (`git add .`).
    async fn stage_all(&self) -> Result<(), GitError>;
}

/// Client for a local repository working tree via the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
    user_name: String,
    user_email: String,
}

impl GitCli {
    /// Create a client for the working tree at `repo_path`, committing as
    /// `user_name <user_email>`.
    pub fn new<P: AsRef<Path>>(
        repo_path: P,
        user_name: impl Into<String>,
        user_email: impl Into<String>,
    ) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        if !path.is_dir() {
            return Err(GitError::RepositoryNotFound(path.display().to_string()));
        }
        let client = Self {
            repo_path: path.to_path_buf(),
            user_name: user_name.into(),
            user_email: user_email.into(),
        };
        info!(path = %path.display(), user = %client.user_name, "created GitCli");
        Ok(client)
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    async fn run_git(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_path)
            .arg("-c").arg("core.editor=true")
            .arg("-c").arg(format!("user.name={}", self.user_name))
            .arg("-c").arg(format!("user.email={}", self.user_email))
            .arg("-c").arg("merge.conflictStyle=merge")
            .args(args)
            .env("GIT_EDITOR", "true")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(cmd = ?format!("git {}", args.join(" ")), "running git command");
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound { GitError::BinaryNotFound("git".into()) }
            else { GitError::IoError(e) }
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, %stderr, "git command failed");
            return Err(GitError::CommandFailed { exit_code, stderr });
        }
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
        })
    }
}

struct CommandOutput {
    stdout: String,
    stderr: String,
}

impl RebaseTool for GitCli {
    #[instrument(skip(self), fields(repo = %self.repo_path.display()))]
    async fn rebase(&self, args: &[&str]) -> Result<String, GitError> {
        let mut full = vec!["rebase"];
        full.extend_from_slice(args);
        let output = self.run_git(&full).await?;
        debug!(stdout = %output.stdout, stderr = %output.stderr, "rebase output");
        Ok(output.stdout + &output.stderr)
    }

    #[instrument(skip(self), fields(repo = %self.repo_path.display()))]
    async fn conflicted_files(&self) -> Result<Vec<PathBuf>, GitError> {
        let output = self
            .run_git(&["diff", "--name-only", "--diff-filter=U", "--relative"])
            .await?;
        debug!(files = %output.stdout, "files with conflicts");
        Ok(parse_conflicted_files(&output.stdout, &self.repo_path))
    }

    #[instrument(skip(self), fields(repo = %self.repo_path.display()))]
    async fn stage_all(&self) -> Result<(), GitError> {
        self.run_git(&["add", "."]).await?;
        Ok(())
    }
}

/// Turn `git diff --name-only` output into paths under `repo_path`.
///
/// The list is reversed so that a lock file is handled after the manifest
/// listed before it.
pub fn parse_conflicted_files(output: &str, repo_path: &Path) -> Vec<PathBuf> {
    output
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(|line| repo_path.join(line))
        .rev()
        .collect()
}
