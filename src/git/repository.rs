//! Repository - git repository operations.
//!
//! [`Repository`] represents the shared state of a git repository (the
//! `.git` common directory). Worktree-specific operations live on
//! [`WorkingTree`], obtained via [`Repository::worktree_at`].
//!
//! Ordering: callers must treat all writing operations as sequentially
//! dependent; nothing in here takes locks beyond git's own.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use dunce::canonicalize;

use crate::shell_exec::{Cmd, announce_dry_run, is_dry_run};

use super::{GitError, Worktree, parse::parse_worktree_porcelain};

/// Snapshot of the rebase machinery state in one worktree.
#[derive(Debug, Clone, Default)]
pub struct RebaseStatus {
    /// A rebase is currently in progress (paused or conflicted)
    pub in_progress: bool,
    /// Paths with unresolved merge conflicts
    pub conflicts: Vec<String>,
}

/// Repository state for git operations.
///
/// # Examples
///
/// ```no_run
/// use workstack::git::Repository;
///
/// let repo = Repository::discover(".")?;
/// let wt = repo.worktree_at(repo.repo_root());
/// let branch = wt.branch()?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Repository {
    /// Path used for discovering the repository and running repo-wide commands.
    discovery_path: PathBuf,
    /// The shared .git directory, computed at construction time.
    git_common_dir: PathBuf,
}

impl Repository {
    /// Discover the repository containing `path`.
    pub fn discover(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let discovery_path = path.into();
        let git_common_dir = Self::resolve_git_common_dir(&discovery_path)?;
        Ok(Self {
            discovery_path,
            git_common_dir,
        })
    }

    /// Resolve the git common directory for a path, or `None` when the path
    /// is not inside a repository.
    ///
    /// For linked worktrees this is the shared `.git` directory of the main
    /// worktree, not the per-worktree `.git/worktrees/<name>` directory.
    pub fn try_git_common_dir(path: &Path) -> Option<PathBuf> {
        let output = Cmd::new("git")
            .args(["rev-parse", "--git-common-dir"])
            .current_dir(path)
            .run()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let raw = PathBuf::from(stdout.trim());
        let absolute = if raw.is_relative() { path.join(&raw) } else { raw };
        canonicalize(&absolute).ok()
    }

    fn resolve_git_common_dir(discovery_path: &Path) -> anyhow::Result<PathBuf> {
        Self::try_git_common_dir(discovery_path).ok_or_else(|| {
            GitError::NotAGitRepository {
                path: discovery_path.to_path_buf(),
            }
            .into()
        })
    }

    /// The shared `.git` directory.
    pub fn git_common_dir(&self) -> &Path {
        &self.git_common_dir
    }

    /// The repository root (the main worktree directory, parent of `.git`).
    pub fn repo_root(&self) -> PathBuf {
        self.git_common_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.git_common_dir.clone())
    }

    /// Get a worktree view at a specific path.
    pub fn worktree_at(&self, path: impl Into<PathBuf>) -> WorkingTree<'_> {
        WorkingTree {
            repo: self,
            path: path.into(),
        }
    }

    // =========================================================================
    // Command execution
    // =========================================================================

    fn logging_context(&self) -> String {
        self.discovery_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string())
    }

    /// Run a git command in the repository's discovery directory, returning
    /// stdout. Non-zero exit becomes an error carrying git's stderr.
    pub fn run_command(&self, args: &[&str]) -> anyhow::Result<String> {
        run_git_in(&self.discovery_path, args, &self.logging_context())
    }

    /// Run a git command and return the raw Output (for inspecting exit codes).
    fn run_command_output(&self, args: &[&str]) -> anyhow::Result<std::process::Output> {
        Cmd::new("git")
            .args(args.iter().copied())
            .current_dir(&self.discovery_path)
            .context(self.logging_context())
            .run()
            .with_context(|| format!("Failed to execute: git {}", args.join(" ")))
    }

    // =========================================================================
    // Worktrees
    // =========================================================================

    /// List all worktrees known to git, including the root worktree.
    pub fn list_worktrees(&self) -> anyhow::Result<Vec<Worktree>> {
        let stdout = self.run_command(&["worktree", "list", "--porcelain"])?;
        Ok(parse_worktree_porcelain(&stdout)
            .into_iter()
            .filter(|wt| !wt.bare)
            .collect())
    }

    /// Create a worktree at `path`.
    ///
    /// - `create_branch` with `branch`: `git worktree add -b <branch> <path> <ref|HEAD>`
    /// - existing `branch`: `git worktree add <path> <branch>`
    /// - neither: `git worktree add <path> [<ref>]` (detached when ref given)
    ///
    /// Pre-checks the single-checkout invariant and the target path so the
    /// user sees an actionable message instead of raw git output.
    pub fn add_worktree(
        &self,
        path: &Path,
        branch: Option<&str>,
        base_ref: Option<&str>,
        create_branch: bool,
    ) -> anyhow::Result<()> {
        if path.exists() {
            return Err(GitError::WorktreePathExists {
                path: path.to_path_buf(),
            }
            .into());
        }

        if let Some(branch) = branch {
            if create_branch {
                if self.branch_exists(branch) {
                    return Err(GitError::message(format!(
                        "Branch '{branch}' already exists; drop --branch or use --from-branch"
                    ))
                    .into());
                }
            } else if let Some(holder) = self.is_branch_checked_out(branch)? {
                return Err(GitError::BranchCheckedOut {
                    branch: branch.to_string(),
                    worktree: holder,
                }
                .into());
            }
        }

        let path_str = path.to_string_lossy().into_owned();
        let mut args: Vec<&str> = vec!["worktree", "add"];
        match (branch, create_branch) {
            (Some(branch), true) => {
                args.extend(["-b", branch]);
                args.push(path_str.as_str());
                args.push(base_ref.unwrap_or("HEAD"));
            }
            (Some(branch), false) => {
                args.push(path_str.as_str());
                args.push(branch);
            }
            (None, _) => {
                args.push(path_str.as_str());
                if let Some(r) = base_ref {
                    args.push(r);
                }
            }
        }

        if is_dry_run() {
            let mut argv = vec!["git"];
            argv.extend(args.iter().copied());
            announce_dry_run(&argv);
            return Ok(());
        }

        self.run_command(&args)?;
        Ok(())
    }

    /// Remove a worktree via git. May fail if git's metadata is already
    /// inconsistent; callers decide whether that is fatal.
    pub fn remove_worktree(&self, path: &Path, force: bool) -> anyhow::Result<()> {
        let path_str = path.to_string_lossy().into_owned();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(path_str.as_str());

        if is_dry_run() {
            let mut argv = vec!["git"];
            argv.extend(args.iter().copied());
            announce_dry_run(&argv);
            return Ok(());
        }

        self.run_command(&args)?;
        Ok(())
    }

    /// Prune stale worktree metadata.
    pub fn prune_worktrees(&self) -> anyhow::Result<()> {
        if is_dry_run() {
            announce_dry_run(&["git", "worktree", "prune"]);
            return Ok(());
        }
        self.run_command(&["worktree", "prune"])?;
        Ok(())
    }

    /// Path of the worktree that has `branch` checked out, if any.
    pub fn is_branch_checked_out(&self, branch: &str) -> anyhow::Result<Option<PathBuf>> {
        Ok(self
            .list_worktrees()?
            .into_iter()
            .find(|wt| wt.branch.as_deref() == Some(branch))
            .map(|wt| wt.path))
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// Detect the default branch: `main` if it exists, else `master`.
    pub fn default_branch(&self) -> anyhow::Result<String> {
        for candidate in ["main", "master"] {
            if self.branch_exists(candidate) {
                return Ok(candidate.to_string());
            }
        }
        Err(GitError::NoDefaultBranch.into())
    }

    /// Whether a local branch exists.
    pub fn branch_exists(&self, branch: &str) -> bool {
        self.run_command_output(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ])
        .map(|out| out.status.success())
        .unwrap_or(false)
    }

    /// Commit SHA at the tip of `branch`, or `None` when the branch is absent.
    pub fn branch_head(&self, branch: &str) -> Option<String> {
        let output = self
            .run_command_output(&["rev-parse", "--verify", &format!("refs/heads/{branch}")])
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Delete a local branch (`-D` when `force`, `-d` otherwise).
    pub fn delete_branch(&self, branch: &str, force: bool) -> anyhow::Result<()> {
        let flag = if force { "-D" } else { "-d" };
        if is_dry_run() {
            announce_dry_run(&["git", "branch", flag, branch]);
            return Ok(());
        }
        self.run_command(&["branch", flag, branch])
            .map_err(|e| GitError::BranchDeletionFailed {
                branch: branch.to_string(),
                error: e.to_string(),
            })?;
        Ok(())
    }

    /// Move `branch` to point at `sha` without touching any worktree.
    pub fn force_branch(&self, branch: &str, sha: &str) -> anyhow::Result<()> {
        if is_dry_run() {
            announce_dry_run(&["git", "branch", "-f", branch, sha]);
            return Ok(());
        }
        self.run_command(&["branch", "-f", branch, sha])?;
        Ok(())
    }

    /// Merge base of two refs, or `None` when they share no history.
    pub fn merge_base(&self, a: &str, b: &str) -> Option<String> {
        let output = self.run_command_output(&["merge-base", a, b]).ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Number of commits in `from..to`.
    pub fn count_commits(&self, from: &str, to: &str) -> anyhow::Result<usize> {
        let stdout = self.run_command(&["rev-list", "--count", &format!("{from}..{to}")])?;
        stdout
            .trim()
            .parse()
            .with_context(|| format!("Unexpected rev-list output: {stdout:?}"))
    }
}

/// A view of one worktree belonging to a [`Repository`].
#[derive(Debug, Clone)]
pub struct WorkingTree<'a> {
    repo: &'a Repository,
    path: PathBuf,
}

impl WorkingTree<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn logging_context(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string())
    }

    fn run_command(&self, args: &[&str]) -> anyhow::Result<String> {
        run_git_in(&self.path, args, &self.logging_context())
    }

    fn run_command_output(&self, args: &[&str]) -> anyhow::Result<std::process::Output> {
        Cmd::new("git")
            .args(args.iter().copied())
            .current_dir(&self.path)
            .context(self.logging_context())
            .run()
            .with_context(|| format!("Failed to execute: git {}", args.join(" ")))
    }

    /// This worktree's `.git` directory (per-worktree for linked worktrees).
    pub fn git_dir(&self) -> anyhow::Result<PathBuf> {
        let stdout = self.run_command(&["rev-parse", "--git-dir"])?;
        let raw = PathBuf::from(stdout.trim());
        let absolute = if raw.is_relative() { self.path.join(raw) } else { raw };
        canonicalize(&absolute).context("Failed to resolve git directory")
    }

    /// Current branch name, or `None` in detached HEAD state.
    pub fn branch(&self) -> anyhow::Result<Option<String>> {
        let output = self.run_command_output(&["symbolic-ref", "--short", "-q", "HEAD"])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    /// Commit SHA of HEAD.
    pub fn head_sha(&self) -> anyhow::Result<String> {
        Ok(self.run_command(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    /// Whether the working tree has any uncommitted changes (staged,
    /// unstaged, or untracked).
    pub fn is_dirty(&self) -> anyhow::Result<bool> {
        let stdout = self.run_command(&["status", "--porcelain"])?;
        Ok(!stdout.trim().is_empty())
    }

    /// Like [`is_dirty`](Self::is_dirty), but untracked files don't count.
    /// Rebase-stack worktrees always carry an untracked metadata file, so
    /// their clean-check must look at tracked changes only.
    pub fn has_tracked_changes(&self) -> anyhow::Result<bool> {
        let stdout = self.run_command(&["status", "--porcelain", "--untracked-files=no"])?;
        Ok(!stdout.trim().is_empty())
    }

    /// Whether the index holds staged changes.
    pub fn has_staged_changes(&self) -> anyhow::Result<bool> {
        let output = self.run_command_output(&["diff", "--cached", "--quiet"])?;
        Ok(!output.status.success())
    }

    /// Counts of commits HEAD is ahead/behind of `base`.
    pub fn ahead_behind(&self, base: &str) -> anyhow::Result<(usize, usize)> {
        let stdout = self.run_command(&[
            "rev-list",
            "--left-right",
            "--count",
            &format!("{base}...HEAD"),
        ])?;
        let mut parts = stdout.split_whitespace();
        let behind = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let ahead = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        Ok((ahead, behind))
    }

    /// Check out a branch in this worktree.
    pub fn checkout_branch(&self, branch: &str) -> anyhow::Result<()> {
        if is_dry_run() {
            announce_dry_run(&["git", "checkout", branch]);
            return Ok(());
        }
        self.run_command(&["checkout", branch])?;
        Ok(())
    }

    /// Detach HEAD at `reference` (frees the branch for another worktree).
    pub fn checkout_detached(&self, reference: &str) -> anyhow::Result<()> {
        if is_dry_run() {
            announce_dry_run(&["git", "checkout", "--detach", reference]);
            return Ok(());
        }
        self.run_command(&["checkout", "--detach", reference])?;
        Ok(())
    }

    /// Stage a file (used when applying conflict resolutions).
    pub fn stage(&self, file: &str) -> anyhow::Result<()> {
        if is_dry_run() {
            announce_dry_run(&["git", "add", file]);
            return Ok(());
        }
        self.run_command(&["add", "--", file])?;
        Ok(())
    }

    /// Hard-reset this worktree to `sha`.
    pub fn reset_hard(&self, sha: &str) -> anyhow::Result<()> {
        if is_dry_run() {
            announce_dry_run(&["git", "reset", "--hard", sha]);
            return Ok(());
        }
        self.run_command(&["reset", "--hard", sha])?;
        Ok(())
    }

    /// Paths with unresolved merge conflicts.
    pub fn conflicted_files(&self) -> anyhow::Result<Vec<String>> {
        let stdout = self.run_command(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(stdout.lines().map(str::to_string).collect())
    }

    /// Whether a rebase is currently in progress in this worktree.
    pub fn rebase_in_progress(&self) -> anyhow::Result<bool> {
        let git_dir = self.git_dir()?;
        Ok(git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists())
    }

    /// Combined rebase-in-progress flag and conflicted file list.
    pub fn rebase_status(&self) -> anyhow::Result<RebaseStatus> {
        let in_progress = self.rebase_in_progress()?;
        let conflicts = if in_progress { self.conflicted_files()? } else { Vec::new() };
        Ok(RebaseStatus {
            in_progress,
            conflicts,
        })
    }

    /// Start rebasing this worktree onto `onto`.
    ///
    /// Returns `(completed, conflicted_files)`: `(true, [])` for a clean
    /// rebase; `(false, files)` when git stopped on conflicts; `(false, [])`
    /// for a fatal failure (caller treats as failed).
    pub fn start_rebase(&self, onto: &str) -> anyhow::Result<(bool, Vec<String>)> {
        if is_dry_run() {
            announce_dry_run(&["git", "rebase", onto]);
            return Ok((true, Vec::new()));
        }
        let output = self.run_command_output(&["rebase", onto])?;
        if output.status.success() {
            return Ok((true, Vec::new()));
        }
        Ok((false, self.conflicted_files()?))
    }

    /// Continue a paused rebase after conflicts were staged.
    ///
    /// Same result contract as [`start_rebase`](Self::start_rebase).
    pub fn continue_rebase(&self) -> anyhow::Result<(bool, Vec<String>)> {
        if is_dry_run() {
            announce_dry_run(&["git", "rebase", "--continue"]);
            return Ok((true, Vec::new()));
        }
        // GIT_EDITOR=true keeps git from opening an editor for the
        // continuation commit message.
        let output = Cmd::new("git")
            .args(["rebase", "--continue"])
            .current_dir(&self.path)
            .context(self.logging_context())
            .env("GIT_EDITOR", "true")
            .run()
            .context("Failed to execute: git rebase --continue")?;
        if output.status.success() {
            return Ok((true, Vec::new()));
        }
        Ok((false, self.conflicted_files()?))
    }
}

/// Run a git command in `dir`, returning stdout and surfacing stderr (and
/// stdout, which some git commands use for errors) on failure.
fn run_git_in(dir: &Path, args: &[&str], context: &str) -> anyhow::Result<String> {
    let output = Cmd::new("git")
        .args(args.iter().copied())
        .current_dir(dir)
        .context(context.to_string())
        .run()
        .with_context(|| format!("Failed to execute: git {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Git uses \r for progress updates; normalize for stable output
        let stderr = stderr.replace('\r', "\n");
        let stdout = String::from_utf8_lossy(&output.stdout);
        let error_msg = [stderr.trim(), stdout.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        bail!("{}", error_msg);
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
