//! Resource keys.
//!
//! A resource key is the normalized string a lock is taken on. Paths are
//! reduced to a repository-relative, forward-slash form so every working copy
//! of the repository (main worktree or linked worktree) maps the same file to
//! the same key. Configured named documents (e.g. `decision-log`) map to their
//! name instead of their path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Normalized identifier of a lockable resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Lexically normalize a path: drop `.`, resolve `..`, join with `/`.
///
/// `..` segments that would climb above the start are kept, so paths
/// outside the repository never collapse onto paths inside it.
pub fn normalize(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut absolute = false;

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                parts.push(prefix.as_os_str().to_string_lossy().replace('\\', "/"))
            }
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push("..".to_string()),
            },
            Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Express `path` relative to the first of `roots` that contains it.
///
/// Relative paths are taken as relative to `roots[0]`. Paths outside every
/// root are returned in normalized absolute form.
pub fn relative_to_roots(path: &Path, roots: &[&Path]) -> String {
    let absolute = match roots.first() {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    };
    let normalized = PathBuf::from(normalize(&absolute));

    for root in roots {
        let root = PathBuf::from(normalize(root));
        if let Ok(rest) = normalized.strip_prefix(&root) {
            return normalize(rest);
        }
    }

    // Fall back to resolving symlinks (e.g. /tmp vs /private/tmp).
    if let Ok(canonical) = canonicalize_existing(&normalized) {
        for root in roots {
            if let Ok(root) = root.canonicalize()
                && let Ok(rest) = canonical.strip_prefix(&root)
            {
                return normalize(rest);
            }
        }
    }

    normalize(&normalized)
}

/// Map a repository-relative path to its resource key.
///
/// `documents` maps document names to their repository-relative paths.
pub fn resource_key(relative: &str, documents: &BTreeMap<String, String>) -> ResourceKey {
    for (name, doc_path) in documents {
        if normalize(Path::new(doc_path)) == relative {
            return ResourceKey::new(name.clone());
        }
    }
    ResourceKey::new(relative)
}

/// Canonicalize the longest existing ancestor and re-append the remainder.
fn canonicalize_existing(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();

    loop {
        if existing.exists() {
            let mut resolved = existing.canonicalize()?;
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return Ok(resolved);
        }
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                tail.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => return Err(std::io::ErrorKind::NotFound.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn documents() -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                "decision-log".to_string(),
                ".tether/decision-log.json".to_string(),
            ),
            (
                "work-registry".to_string(),
                "./.tether/work-registry.json".to_string(),
            ),
        ])
    }

    #[test]
    fn test_normalize_strips_dots_and_uses_slashes() {
        assert_eq!(normalize(Path::new("./src/./lib.rs")), "src/lib.rs");
        assert_eq!(normalize(Path::new("src/a/../b.rs")), "src/b.rs");
        assert_eq!(normalize(Path::new("/repo/./x/../y")), "/repo/y");
    }

    #[test]
    fn test_normalize_keeps_leading_parent_dirs() {
        assert_eq!(normalize(Path::new("../outside.json")), "../outside.json");
        assert_eq!(normalize(Path::new("a/../../b")), "../b");
        assert_eq!(normalize(Path::new("/../etc")), "/etc");
    }

    #[test]
    fn test_relative_paths_resolve_against_first_root() {
        let key = relative_to_roots(Path::new("docs/notes.json"), &[Path::new("/repo/.wt/a")]);
        assert_eq!(key, "docs/notes.json");
    }

    #[test]
    fn test_absolute_path_in_linked_worktree_matches_main() {
        let roots = [Path::new("/repo/.worktrees/task-1"), Path::new("/repo")];
        let from_linked =
            relative_to_roots(Path::new("/repo/.worktrees/task-1/data/reg.json"), &roots);
        let from_main = relative_to_roots(Path::new("/repo/data/reg.json"), &roots);
        assert_eq!(from_linked, "data/reg.json");
        assert_eq!(from_main, "data/reg.json");
    }

    #[test]
    fn test_path_outside_roots_stays_absolute() {
        let key = relative_to_roots(Path::new("/elsewhere/file.json"), &[Path::new("/repo")]);
        assert_eq!(key, "/elsewhere/file.json");
    }

    #[test]
    fn test_symlinked_root_still_relativizes() {
        let temp_dir = TempDir::new().unwrap();
        let canonical = temp_dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(canonical.join("data")).unwrap();

        let key = relative_to_roots(&canonical.join("data/new.json"), &[temp_dir.path()]);
        assert_eq!(key, "data/new.json");
    }

    #[test]
    fn test_named_documents_map_to_names() {
        let docs = documents();
        assert_eq!(
            resource_key(".tether/decision-log.json", &docs).as_str(),
            "decision-log"
        );
        assert_eq!(
            resource_key(".tether/work-registry.json", &docs).as_str(),
            "work-registry"
        );
        assert_eq!(resource_key("src/lib.rs", &docs).as_str(), "src/lib.rs");
    }
}
