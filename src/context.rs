//! Repository context resolution for tether.
//!
//! Every working copy of a repository (the main worktree and each linked
//! worktree) must coordinate through the same state directory, so the state
//! always lives under the *main* worktree: `{repo_root}/.tether/`.
//!
//! Commands resolve a [`TetherContext`] once and derive every path from it.

use crate::config::Config;
use crate::error::{Result, TetherError};
use crate::git;
use crate::resource::{ResourceKey, relative_to_roots, resource_key};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the coordination state directory under the main worktree.
pub const STATE_DIR: &str = ".tether";

/// Resolved paths for coordination state. All paths are absolute.
#[derive(Debug, Clone)]
pub struct TetherContext {
    /// The main worktree (original clone location).
    pub repo_root: PathBuf,

    /// Toplevel of the working copy the command was invoked from. Equal to
    /// `repo_root` unless invoked from a linked worktree.
    pub worktree_root: PathBuf,

    /// `{repo_root}/.tether/`.
    pub state_dir: PathBuf,
}

impl TetherContext {
    /// Resolve the context from the current working directory.
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            TetherError::UserError(format!("failed to get current working directory: {}", e))
        })?;

        Self::resolve_from(&cwd)
    }

    /// Resolve the context from any directory inside a repository.
    pub fn resolve_from<P: AsRef<Path>>(cwd: P) -> Result<Self> {
        let cwd = cwd.as_ref();
        let worktree_root = git::get_repo_root(cwd)?;
        let repo_root = Self::find_main_worktree(cwd, &worktree_root)?;

        Ok(Self {
            state_dir: repo_root.join(STATE_DIR),
            repo_root,
            worktree_root,
        })
    }

    /// A context rooted at `root` without consulting git.
    pub fn at<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            state_dir: root.join(STATE_DIR),
            worktree_root: root.clone(),
            repo_root: root,
        }
    }

    fn find_main_worktree(cwd: &Path, worktree_root: &Path) -> Result<PathBuf> {
        match git::get_main_worktree(cwd) {
            Ok(main) if main.exists() => Ok(main),
            Ok(_) => Ok(worktree_root.to_path_buf()),
            Err(e) => {
                tracing::debug!(error = %e, "git worktree list failed; inspecting .git");
                Ok(Self::infer_main_worktree(worktree_root))
            }
        }
    }

    /// Work out the main worktree from a linked worktree's `.git` file.
    ///
    /// A linked worktree's `.git` is a file containing
    /// `gitdir: {main}/.git/worktrees/{name}`. Anything else means
    /// `worktree_root` already is the main worktree.
    fn infer_main_worktree(worktree_root: &Path) -> PathBuf {
        let dot_git = worktree_root.join(".git");
        if !dot_git.is_file() {
            return worktree_root.to_path_buf();
        }

        let gitdir = std::fs::read_to_string(&dot_git)
            .ok()
            .and_then(|content| {
                content
                    .strip_prefix("gitdir: ")
                    .map(|dir| PathBuf::from(dir.trim()))
            });

        gitdir
            .as_deref()
            .and_then(Path::parent) // .git/worktrees
            .and_then(Path::parent) // .git
            .and_then(Path::parent) // main worktree
            .filter(|main| main.exists())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| worktree_root.to_path_buf())
    }

    /// Whether `tether init` has been run (the state directory exists).
    pub fn is_initialized(&self) -> bool {
        self.state_dir.is_dir()
    }

    /// Fail with guidance if the state directory does not exist.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        Err(TetherError::UserError(format!(
            "tether is not initialized.\n\
             Expected state directory at: {}\n\n\
             Run `tether init` to enable coordination in this repository.",
            self.state_dir.display()
        )))
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }

    pub fn lock_store_path(&self) -> PathBuf {
        self.state_dir.join("locks.json")
    }

    pub fn events_file(&self) -> PathBuf {
        self.state_dir.join("events.ndjson")
    }

    /// Load `config.yaml`, falling back to defaults when it is missing.
    pub fn load_config(&self) -> Result<Config> {
        Config::load_or_default(self.config_path())
    }

    /// Express `path` relative to the repository.
    ///
    /// The invoking working copy is tried first so that the same file in any
    /// worktree maps to the same relative path. Relative inputs are taken as
    /// relative to that working copy.
    pub fn repo_relative<P: AsRef<Path>>(&self, path: P) -> String {
        relative_to_roots(
            path.as_ref(),
            &[self.worktree_root.as_path(), self.repo_root.as_path()],
        )
    }

    /// The resource key guarding `path`.
    pub fn resource_key_for<P: AsRef<Path>>(&self, path: P, config: &Config) -> ResourceKey {
        resource_key(&self.repo_relative(path), &config.documents)
    }

    /// Absolute path of a named document, if `name` is configured.
    ///
    /// Named documents always live under the main worktree.
    pub fn document_path(&self, name: &str, config: &Config) -> Option<PathBuf> {
        config
            .documents
            .get(name)
            .map(|relative| self.repo_root.join(relative))
    }
}
