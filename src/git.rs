//! Minimal git plumbing used to locate the shared coordination state.
//!
//! tether never mutates a repository; it only asks git where the current
//! working copy and the main worktree live.

use crate::error::{Result, TetherError};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Captured output of a successful git invocation.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Standard output (trimmed).
    pub stdout: String,
    /// Standard error (trimmed).
    pub stderr: String,
}

impl GitOutput {
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

/// Run `git <args>` in `cwd`.
///
/// A non-zero exit becomes [`TetherError::GitError`] carrying git's own
/// message.
pub fn run_git<P: AsRef<Path>>(cwd: P, args: &[&str]) -> Result<GitOutput> {
    let subcommand = args.first().copied().unwrap_or("");

    let output = Command::new("git")
        .current_dir(cwd.as_ref())
        .args(args)
        .output()
        .map_err(|e| TetherError::GitError(format!("failed to execute git {}: {}", subcommand, e)))?;

    let captured = GitOutput::from_output(&output);
    if output.status.success() {
        return Ok(captured);
    }

    let message = if captured.stderr.is_empty() {
        &captured.stdout
    } else {
        &captured.stderr
    };
    Err(TetherError::GitError(format!(
        "git {} failed (exit code {}): {}",
        subcommand,
        output.status.code().unwrap_or(-1),
        message
    )))
}

/// Toplevel of the working copy containing `cwd` (`rev-parse --show-toplevel`).
///
/// Being outside any repository is a user error (exit 1), not a git failure.
pub fn get_repo_root<P: AsRef<Path>>(cwd: P) -> Result<PathBuf> {
    match run_git(cwd, &["rev-parse", "--show-toplevel"]) {
        Ok(output) => Ok(PathBuf::from(output.stdout)),
        Err(TetherError::GitError(message)) if message.contains("not a git repository") => {
            Err(TetherError::UserError(
                "not inside a git repository. Run this command from within a git repository, \
                 or pass --root <DIR>."
                    .to_string(),
            ))
        }
        Err(TetherError::GitError(message)) if message.contains("failed to execute") => Err(
            TetherError::UserError(format!("{} (is git installed?)", message)),
        ),
        Err(e) => Err(e),
    }
}

/// Path of the main worktree (the original clone), even from a linked worktree.
///
/// `git worktree list --porcelain` always lists the main worktree first.
pub fn get_main_worktree<P: AsRef<Path>>(cwd: P) -> Result<PathBuf> {
    let cwd = cwd.as_ref();
    let output = run_git(cwd, &["worktree", "list", "--porcelain"])?;

    match output
        .stdout
        .lines()
        .find_map(|line| line.strip_prefix("worktree "))
    {
        Some(path) => Ok(PathBuf::from(path)),
        None => get_repo_root(cwd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_repo, create_test_repo_with_worktree};
    use tempfile::TempDir;

    #[test]
    fn test_run_git_captures_stdout() {
        let temp_dir = create_test_repo();
        let output = run_git(temp_dir.path(), &["rev-parse", "--show-toplevel"]).unwrap();
        assert!(!output.stdout.is_empty());
    }

    #[test]
    fn test_run_git_failure_is_git_error() {
        let temp_dir = create_test_repo();
        let err = run_git(temp_dir.path(), &["rev-parse", "--verify", "no-such-ref"]).unwrap_err();

        assert!(matches!(err, TetherError::GitError(_)));
        assert!(err.to_string().contains("git rev-parse failed"));
    }

    #[test]
    fn test_get_repo_root_from_subdirectory() {
        let temp_dir = create_test_repo();
        let nested = temp_dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let root = get_repo_root(&nested).unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            temp_dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_get_repo_root_outside_repo_is_user_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = get_repo_root(temp_dir.path()).unwrap_err();

        assert!(matches!(err, TetherError::UserError(_)));
        assert!(err.to_string().contains("not inside a git repository"));
    }

    #[test]
    fn test_get_main_worktree_from_linked_worktree() {
        let (temp_dir, linked) = create_test_repo_with_worktree("session-b");
        let main = temp_dir.path();

        let resolved = get_main_worktree(&linked).unwrap();
        assert_eq!(
            resolved.canonicalize().unwrap(),
            main.canonicalize().unwrap()
        );
    }
}
