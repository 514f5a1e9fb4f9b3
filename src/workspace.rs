//! Repository context discovery.

use std::path::{Path, PathBuf};

use anyhow::bail;

use crate::config::GlobalConfig;
use crate::git::Repository;

/// Names that can never be used as worktree names. `root` always refers to
/// the repository root; `main`/`master` redirect there.
pub const RESERVED_NAMES: &[&str] = &["root", "main", "master"];

/// Whether `name` is reserved (case-insensitive).
pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.iter().any(|r| name.eq_ignore_ascii_case(r))
}

/// A git repo root and its managed worktrees directory.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoContext {
    /// The main repository root (parent of the shared `.git` directory).
    pub root: PathBuf,
    pub repo_name: String,
    /// `<workstacks_root>/<repo_name>/`
    pub workstacks_dir: PathBuf,
}

/// Walk up from `start` to find the repository this directory belongs to.
///
/// Worktrees are handled by asking git for the common `.git` directory, so
/// running from inside a linked worktree still resolves the main repository
/// root. Falls back to walking the tree for a `.git` directory when git
/// itself can't answer.
pub fn discover_repo_context(start: &Path, config: &GlobalConfig) -> anyhow::Result<RepoContext> {
    let cur = dunce::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());

    let root = match Repository::try_git_common_dir(&cur) {
        Some(git_dir) => git_dir.parent().map(Path::to_path_buf),
        None => cur
            .ancestors()
            .find(|dir| dir.join(".git").is_dir())
            .map(Path::to_path_buf),
    };

    let Some(root) = root else {
        bail!("Not inside a git repository (no .git found up the tree).");
    };

    let Some(repo_name) = root.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        bail!("Repository root has no name: {}", root.display());
    };

    let workstacks_dir = config.workstacks_root.join(&repo_name);

    Ok(RepoContext {
        root,
        repo_name,
        workstacks_dir,
    })
}

/// Ensure the workstacks directory exists and return it.
pub fn ensure_workstacks_dir(repo: &RepoContext) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(&repo.workstacks_dir)?;
    Ok(repo.workstacks_dir.clone())
}

/// The absolute path for a named worktree.
pub fn worktree_path_for(workstacks_dir: &Path, name: &str) -> PathBuf {
    workstacks_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names_any_casing() {
        for name in ["root", "ROOT", "Main", "main", "MASTER", "master"] {
            assert!(is_reserved_name(name), "{name} should be reserved");
        }
        assert!(!is_reserved_name("feature"));
        assert!(!is_reserved_name("mainline"));
    }

    #[test]
    fn test_worktree_path_for() {
        assert_eq!(
            worktree_path_for(Path::new("/ws/repo"), "feature-x"),
            PathBuf::from("/ws/repo/feature-x")
        );
    }
}
