//! Rebase stacks: isolated worktrees for speculative rebases.
//!
//! A rebase stack is a throwaway worktree seeded from a branch's current
//! commit. The rebase is attempted, resolved, and tested there; only `apply`
//! touches the real branch. Stacks live outside the workstacks directory
//! (default `<repo_root>/../.rebase-stack-<branch>/`) so they are never
//! discovered as user worktrees.
//!
//! State machine:
//!
//! ```text
//! CREATED ─start_rebase──► IN_PROGRESS ──conflicts?──► CONFLICTED
//!                                     └──clean────────► RESOLVED
//!                                     └──fatal────────► FAILED
//! CONFLICTED ──resolve───► RESOLVED or CONFLICTED (loop) or FAILED
//! RESOLVED ──test────────► TESTED or FAILED
//! RESOLVED|TESTED ──apply──► APPLIED (terminal, then cleanup)
//! any ──abort──► (terminal, then cleanup)
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::git::{RebaseStatus, Repository};
use crate::shell_exec::{Cmd, ShellConfig};

/// Prefix for the throwaway branch checked out in a stack worktree.
pub const STACK_BRANCH_PREFIX: &str = "workstack/rebase-stack-";

/// Metadata file stored inside each stack worktree.
pub const METADATA_FILENAME: &str = ".rebase-stack-metadata";

/// Lifecycle state of a rebase stack.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StackState {
    /// Stack created, rebase not started
    Created,
    /// Rebase running or paused
    InProgress,
    /// Has unresolved conflicts
    Conflicted,
    /// Conflicts resolved, ready to test
    Resolved,
    /// Tests passed, ready to apply
    Tested,
    /// Tests failed or rebase failed
    Failed,
    /// Successfully applied to the target branch
    Applied,
}

/// Persistent metadata for a rebase stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackMetadata {
    pub branch_name: String,
    pub target_branch: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    /// SHA of the real branch when the stack was created. Never mutated
    /// after creation - this is the rollback anchor.
    pub original_commit: String,
    pub state: StackState,
}

/// Runtime information about a stack (saved state overlaid with the live
/// rebase status).
#[derive(Debug, Clone)]
pub struct StackInfo {
    pub branch_name: String,
    pub stack_path: PathBuf,
    pub created_at: String,
    pub state: StackState,
    pub target_branch: String,
    pub conflicts: Vec<String>,
    pub commits_to_rebase: usize,
    pub commits_applied: usize,
}

/// Operations on the rebase stacks of one repository.
pub struct RebaseStacks<'a> {
    repo: &'a Repository,
    location: String,
}

impl<'a> RebaseStacks<'a> {
    pub fn new(repo: &'a Repository, location: &str) -> Self {
        let location = location.trim();
        let location = if location.is_empty() {
            crate::config::DEFAULT_REBASE_STACK_LOCATION
        } else {
            location
        };
        Self {
            repo,
            location: location.to_string(),
        }
    }

    /// Throwaway branch name for a stack.
    pub fn stack_branch_name(&self, branch: &str) -> String {
        format!("{STACK_BRANCH_PREFIX}{}", sanitize_branch(branch))
    }

    /// Where the stack worktree for `branch` lives.
    ///
    /// A plain location like `.rebase-stack` becomes a sibling directory of
    /// the repo root (`<repo>/../.rebase-stack-<branch>/`). A location with
    /// path separators (or an absolute one) is treated as a base directory
    /// holding one subdirectory per branch.
    pub fn stack_path(&self, branch: &str) -> PathBuf {
        let safe_branch = sanitize_branch(branch);
        let repo_root = self.repo.repo_root();
        let parent = repo_root.parent().unwrap_or(&repo_root).to_path_buf();

        let location_path = Path::new(&self.location);
        if location_path.is_absolute() || location_path.components().count() > 1 {
            let base = if location_path.is_absolute() {
                location_path.to_path_buf()
            } else {
                parent.join(location_path)
            };
            return base.join(safe_branch);
        }

        let separator = if self.location.ends_with(['-', '_']) { "" } else { "-" };
        parent.join(format!("{}{}{}", self.location, separator, safe_branch))
    }

    /// Whether a stack exists for `branch`.
    pub fn stack_exists(&self, branch: &str) -> bool {
        self.stack_path(branch).exists()
    }

    /// Create a stack worktree for `branch`, replacing any existing one.
    pub fn create_stack(&self, branch: &str, target_branch: &str) -> anyhow::Result<PathBuf> {
        let stack_path = self.stack_path(branch);
        let stack_branch = self.stack_branch_name(branch);

        if stack_path.exists() {
            self.cleanup_stack(branch);
        } else if self.repo.branch_exists(&stack_branch) {
            // Orphaned throwaway branch from a previous run
            self.repo.delete_branch(&stack_branch, true)?;
        }

        if let Some(parent) = stack_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        self.repo
            .add_worktree(&stack_path, Some(&stack_branch), Some(branch), true)?;

        // Nothing on disk to describe in dry-run mode
        if !stack_path.exists() {
            return Ok(stack_path);
        }

        let original_commit = self.repo.worktree_at(&stack_path).head_sha()?;
        save_metadata(
            &stack_path,
            &StackMetadata {
                branch_name: branch.to_string(),
                target_branch: target_branch.to_string(),
                created_at: chrono::Local::now().to_rfc3339(),
                original_commit,
                state: StackState::Created,
            },
        )?;

        Ok(stack_path)
    }

    /// Remove a stack: metadata, worktree, and the throwaway branch.
    ///
    /// Every step is best-effort. There is no reliable pre-check for whether
    /// `git worktree remove` will succeed (stale locks, half-removed trees),
    /// so failures are logged and the remaining steps still run.
    pub fn cleanup_stack(&self, branch: &str) {
        let stack_path = self.stack_path(branch);
        let stack_branch = self.stack_branch_name(branch);

        if stack_path.exists() {
            let _ = std::fs::remove_file(stack_path.join(METADATA_FILENAME));

            if let Err(e) = self.repo.remove_worktree(&stack_path, true) {
                log::debug!("git worktree remove failed during stack cleanup: {e}");
            }
            if stack_path.exists() && !crate::shell_exec::is_dry_run() {
                if let Err(e) = std::fs::remove_dir_all(&stack_path) {
                    log::debug!("Failed to delete stack directory: {e}");
                }
            }
            if let Err(e) = self.repo.prune_worktrees() {
                log::debug!("git worktree prune failed during stack cleanup: {e}");
            }
        }

        if self.repo.branch_exists(&stack_branch)
            && let Err(e) = self.repo.delete_branch(&stack_branch, true)
        {
            log::debug!("Failed to delete lingering stack branch: {e}");
        }
    }

    /// Update the persisted state of a stack. `original_commit` and the
    /// other creation-time fields are preserved as-is.
    pub fn update_state(&self, stack_path: &Path, new_state: StackState) -> anyhow::Result<()> {
        let Some(mut metadata) = load_metadata(stack_path)? else {
            return Ok(());
        };
        metadata.state = new_state;
        save_metadata(stack_path, &metadata)
    }

    /// Detailed info for one stack, or `None` when `stack_path` is not a
    /// stack worktree.
    pub fn get_stack_info(&self, stack_path: &Path) -> anyhow::Result<Option<StackInfo>> {
        if !stack_path.exists() {
            return Ok(None);
        }
        let Some(metadata) = load_metadata(stack_path)? else {
            return Ok(None);
        };

        let rebase_status = self.repo.worktree_at(stack_path).rebase_status()?;
        let state = determine_state(&rebase_status, &metadata);
        let (commits_to_rebase, commits_applied) =
            self.commit_counts(stack_path, &metadata, &rebase_status);

        Ok(Some(StackInfo {
            branch_name: metadata.branch_name,
            stack_path: stack_path.to_path_buf(),
            created_at: metadata.created_at,
            state,
            target_branch: metadata.target_branch,
            conflicts: rebase_status.conflicts,
            commits_to_rebase,
            commits_applied,
        }))
    }

    /// Enumerate all active stacks of this repository.
    pub fn list_stacks(&self) -> anyhow::Result<Vec<StackInfo>> {
        let mut stacks = Vec::new();
        for wt in self.repo.list_worktrees()? {
            let Some(metadata) = load_metadata(&wt.path)? else {
                continue;
            };
            // Ignore metadata files in worktrees this tool doesn't manage
            if self.stack_path(&metadata.branch_name) != wt.path {
                continue;
            }
            if let Some(info) = self.get_stack_info(&wt.path)? {
                stacks.push(info);
            }
        }
        Ok(stacks)
    }

    /// Commit counters relative to the merge base with the target branch.
    /// Best-effort: anything unanswerable reads as zero.
    fn commit_counts(
        &self,
        stack_path: &Path,
        metadata: &StackMetadata,
        rebase_status: &RebaseStatus,
    ) -> (usize, usize) {
        let to_rebase = self
            .repo
            .merge_base(&metadata.target_branch, &metadata.original_commit)
            .and_then(|base| self.repo.count_commits(&base, &metadata.original_commit).ok())
            .unwrap_or(0);

        let applied = if rebase_status.in_progress {
            0
        } else {
            self.repo
                .worktree_at(stack_path)
                .head_sha()
                .ok()
                .and_then(|head| {
                    let base = self.repo.merge_base(&metadata.target_branch, &head)?;
                    self.repo.count_commits(&base, &head).ok()
                })
                .unwrap_or(0)
        };

        (to_rebase, applied)
    }
}

fn sanitize_branch(branch: &str) -> String {
    branch.replace('/', "-")
}

fn metadata_path(stack_path: &Path) -> PathBuf {
    stack_path.join(METADATA_FILENAME)
}

fn save_metadata(stack_path: &Path, metadata: &StackMetadata) -> anyhow::Result<()> {
    let path = metadata_path(stack_path);
    let json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Load stack metadata, or `None` when the worktree carries none.
pub fn load_metadata(stack_path: &Path) -> anyhow::Result<Option<StackMetadata>> {
    let path = metadata_path(stack_path);
    if !path.exists() {
        return Ok(None);
    }
    let content =
        std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let metadata = serde_json::from_str(&content)
        .with_context(|| format!("Invalid stack metadata in {}", path.display()))?;
    Ok(Some(metadata))
}

/// Current state: the live rebase status overrides the saved state while a
/// rebase is actually in flight.
fn determine_state(rebase_status: &RebaseStatus, metadata: &StackMetadata) -> StackState {
    if rebase_status.in_progress {
        if rebase_status.conflicts.is_empty() {
            return StackState::InProgress;
        }
        return StackState::Conflicted;
    }
    metadata.state
}

// ============================================================================
// Test running inside a stack
// ============================================================================

/// Outcome of a test run in a stack worktree.
#[derive(Debug)]
pub struct TestRunResult {
    pub success: bool,
    pub exit_code: i32,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
}

/// Auto-detect a test command from project files. Priority order is fixed;
/// the first match wins.
pub fn detect_test_command(dir: &Path) -> Option<String> {
    if dir.join("package.json").exists() {
        return Some("npm test".to_string());
    }
    if dir.join("pytest.ini").exists() || dir.join("pyproject.toml").exists() {
        return Some("pytest".to_string());
    }
    if let Ok(makefile) = std::fs::read_to_string(dir.join("Makefile"))
        && makefile.lines().any(|line| line.starts_with("test:"))
    {
        return Some("make test".to_string());
    }
    if dir.join("Cargo.toml").exists() {
        return Some("cargo test".to_string());
    }
    if dir.join("go.mod").exists() {
        return Some("go test ./...".to_string());
    }
    None
}

/// Run a test command in the stack worktree through the platform shell,
/// capturing output.
pub fn run_tests(dir: &Path, command: &str) -> anyhow::Result<TestRunResult> {
    let shell = ShellConfig::get();
    let start = std::time::Instant::now();

    let output = Cmd::new(shell.executable.to_string_lossy())
        .args(shell.args.iter().cloned())
        .arg(command)
        .current_dir(dir)
        .context("rebase-stack tests")
        .run()
        .with_context(|| format!("Failed to run test command: {command}"))?;

    Ok(TestRunResult {
        success: output.status.success(),
        exit_code: output.status.code().unwrap_or(-1),
        duration: start.elapsed(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
