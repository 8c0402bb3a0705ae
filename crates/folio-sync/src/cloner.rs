//! Fetching a repository checkout.

use std::ffi::OsString;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Failure to produce a checkout.
#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    /// Branch names starting with `-` or containing unexpected characters are
    /// refused before running git.
    #[error("invalid branch name: {0}")]
    InvalidBranch(String),
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("git clone exited with {}: {stderr}", status.map_or_else(|| "signal".to_owned(), |c| c.to_string()))]
    Failed { status: Option<i32>, stderr: String },
}

/// Produces a working tree of `branch` of the repository at `url` in `dest`.
///
/// `dest` does not exist yet; the cloner creates it.
pub trait Cloner: Send + Sync {
    fn clone_repo(
        &self,
        url: &str,
        branch: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<(), CloneError>> + Send;
}

/// Shallow clone through the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCloner {
    program: OsString,
}

impl Default for GitCloner {
    fn default() -> Self {
        Self {
            program: OsString::from("git"),
        }
    }
}

impl GitCloner {
    /// Use a specific git executable.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Cloner for GitCloner {
    async fn clone_repo(&self, url: &str, branch: &str, dest: &Path) -> Result<(), CloneError> {
        validate_branch(branch)?;

        tracing::info!(url, branch, dest = %dest.display(), "Cloning repository");
        let output = Command::new(&self.program)
            .args(["clone", "--quiet", "--depth", "1", "--branch", branch, "--"])
            .arg(url)
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(CloneError::Spawn)?;

        if !output.status.success() {
            return Err(CloneError::Failed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(())
    }
}

fn validate_branch(branch: &str) -> Result<(), CloneError> {
    let valid = !branch.is_empty()
        && !branch.starts_with('-')
        && branch
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if valid {
        Ok(())
    } else {
        Err(CloneError::InvalidBranch(branch.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_branch() {
        assert!(validate_branch("master").is_ok());
        assert!(validate_branch("release/2.1").is_ok());
        assert!(validate_branch("--upload-pack=evil").is_err());
        assert!(validate_branch("main;rm").is_err());
        assert!(validate_branch("").is_err());
    }

    #[tokio::test]
    async fn test_invalid_branch_does_not_spawn() {
        let cloner = GitCloner::with_program("/nonexistent/git");
        let err = cloner
            .clone_repo("https://example.com/r.git", "-x", Path::new("/tmp/unused"))
            .await
            .unwrap_err();
        assert!(matches!(err, CloneError::InvalidBranch(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let cloner = GitCloner::with_program("/nonexistent/git");
        let err = cloner
            .clone_repo("https://example.com/r.git", "main", Path::new("/tmp/unused"))
            .await
            .unwrap_err();
        assert!(matches!(err, CloneError::Spawn(_)));
    }
}
