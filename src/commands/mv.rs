//! `workstack move` - move branches between worktrees.

use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::Args;
use color_print::cprintln;

use crate::config::GlobalConfig;
use crate::git::{GitError, Repository, Worktree};
use crate::styling::confirm;
use crate::workspace::{discover_repo_context, ensure_workstacks_dir, worktree_path_for};

#[derive(Debug, Args)]
pub struct MoveArgs {
    /// Target worktree name, or 'root' for the repository root
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Use the current worktree as source (the default)
    #[arg(long)]
    pub current: bool,

    /// Auto-detect the source worktree from this branch
    #[arg(long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Use a specific worktree as source
    #[arg(long, value_name = "NAME")]
    pub worktree: Option<String>,

    /// Fallback branch for the source after the move
    #[arg(long, default_value = "main")]
    pub r#ref: String,

    /// Skip confirmation prompts and uncommitted-change checks
    #[arg(short, long)]
    pub force: bool,
}

enum Operation {
    /// Target doesn't exist: move the branch into a new worktree
    Create,
    /// Target exists with a branch: exchange branches
    Swap,
    /// Target exists detached: attach the source's branch to it
    Move,
}

pub fn run(args: MoveArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = GlobalConfig::load()?;
    let repo = discover_repo_context(&cwd, &config)?;
    let git = Repository::discover(&cwd)?;
    let workstacks_dir = ensure_workstacks_dir(&repo)?;

    let source_wt = resolve_source_worktree(&git, &args, &workstacks_dir, &cwd)?;

    let target_wt = if args.target == "root" {
        repo.root.clone()
    } else {
        worktree_path_for(&workstacks_dir, &args.target)
    };

    if resolve(&source_wt) == resolve(&target_wt) {
        bail!("Source and target worktrees are the same");
    }

    let operation = detect_operation(&git, &target_wt)?;

    match operation {
        Operation::Swap => execute_swap(&git, &source_wt, &target_wt, args.force),
        Operation::Create | Operation::Move => {
            // The literal default is "main"; fall back to the detected
            // default branch in repos that use master
            let fallback_ref = if args.r#ref == "main" && !git.branch_exists("main") {
                git.default_branch()?
            } else {
                args.r#ref.clone()
            };
            execute_move(&git, &source_wt, &target_wt, &fallback_ref, args.force)
        }
    }
}

fn resolve(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn worktree_branch(git: &Repository, wt_path: &Path) -> anyhow::Result<Option<String>> {
    let resolved = resolve(wt_path);
    Ok(git
        .list_worktrees()?
        .into_iter()
        .find(|wt| resolve(&wt.path) == resolved)
        .and_then(|wt| wt.branch))
}

/// Which worktree contains `path`. The most specific (deepest) match wins,
/// so nested worktrees resolve correctly.
fn worktree_containing(worktrees: &[Worktree], path: &Path) -> Option<PathBuf> {
    worktrees
        .iter()
        .map(|wt| resolve(&wt.path))
        .filter(|wt_path| path.starts_with(wt_path))
        .max_by_key(|wt_path| wt_path.components().count())
}

fn resolve_source_worktree(
    git: &Repository,
    args: &MoveArgs,
    workstacks_dir: &Path,
    cwd: &Path,
) -> anyhow::Result<PathBuf> {
    let flag_count = [args.current, args.branch.is_some(), args.worktree.is_some()]
        .iter()
        .filter(|f| **f)
        .count();
    if flag_count > 1 {
        bail!("Only one of --current, --branch, or --worktree can be specified");
    }

    if let Some(ref branch) = args.branch {
        let Some(wt) = git.is_branch_checked_out(branch)? else {
            bail!("Branch '{branch}' not found in any worktree");
        };
        return Ok(wt);
    }

    if let Some(ref name) = args.worktree {
        let wt_path = worktree_path_for(workstacks_dir, name);
        if !wt_path.exists() {
            bail!("Worktree '{name}' does not exist");
        }
        return Ok(wt_path);
    }

    // Default (and explicit --current): the worktree containing cwd
    let worktrees = git.list_worktrees()?;
    let cwd = resolve(cwd);
    let Some(wt_path) = worktree_containing(&worktrees, &cwd) else {
        bail!(
            "Current directory ({}) is not in any worktree.\nEither run this from within a worktree, or use --worktree or --branch to specify the source.",
            cwd.display()
        );
    };
    Ok(wt_path)
}

fn detect_operation(git: &Repository, target_wt: &Path) -> anyhow::Result<Operation> {
    if !target_wt.exists() {
        return Ok(Operation::Create);
    }
    match worktree_branch(git, target_wt)? {
        Some(_) => Ok(Operation::Swap),
        None => Ok(Operation::Move),
    }
}

fn check_clean(git: &Repository, wt_path: &Path, force: bool) -> anyhow::Result<()> {
    if force {
        return Ok(());
    }
    // A worktree in a broken state reads as clean; the subsequent git
    // operations will surface real problems
    let dirty = git.worktree_at(wt_path).is_dirty().unwrap_or(false);
    if dirty {
        return Err(GitError::UncommittedChanges {
            worktree: name_of(wt_path),
        }
        .into());
    }
    Ok(())
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Move the source's branch to the target (creating it if needed), then
/// switch the source to `fallback_ref`.
fn execute_move(
    git: &Repository,
    source_wt: &Path,
    target_wt: &Path,
    fallback_ref: &str,
    force: bool,
) -> anyhow::Result<()> {
    let Some(source_branch) = worktree_branch(git, source_wt)? else {
        bail!("Source worktree is in detached HEAD state");
    };

    check_clean(git, source_wt, force)?;

    let target_exists = target_wt.exists();

    // Git disallows one branch in two worktrees, so the branch is freed
    // first:
    //   1. Detach HEAD in source (frees source_branch)
    //   2. Check out source_branch in target
    //   3. Check out fallback_ref in source
    cprintln!(
        "Moving <bold>{source_branch}</> from <bold>{}</> to <bold>{}</>",
        name_of(source_wt),
        name_of(target_wt)
    );
    git.worktree_at(source_wt).checkout_detached(&source_branch)?;

    if target_exists {
        check_clean(git, target_wt, force)?;
        git.worktree_at(target_wt).checkout_branch(&source_branch)?;
    } else {
        git.add_worktree(target_wt, Some(&source_branch), None, false)?;
    }

    // The fallback ref may itself be checked out elsewhere; detach that
    // worktree first so the source can take it
    if let Some(holder) = git.is_branch_checked_out(fallback_ref)?
        && resolve(&holder) != resolve(source_wt)
    {
        git.worktree_at(&holder).checkout_detached(fallback_ref)?;
    }

    git.worktree_at(source_wt).checkout_branch(fallback_ref)?;

    cprintln!(
        "<green>✓ Moved <bold>{source_branch}</> from <bold>{}</> to <bold>{}</></>",
        name_of(source_wt),
        name_of(target_wt)
    );
    Ok(())
}

/// Exchange branches between two worktrees.
fn execute_swap(
    git: &Repository,
    source_wt: &Path,
    target_wt: &Path,
    force: bool,
) -> anyhow::Result<()> {
    let source_branch = worktree_branch(git, source_wt)?;
    let target_branch = worktree_branch(git, target_wt)?;
    let (Some(source_branch), Some(target_branch)) = (source_branch, target_branch) else {
        bail!("Both worktrees must have branches checked out for swap");
    };

    check_clean(git, source_wt, force)?;
    check_clean(git, target_wt, force)?;

    if !force {
        println!("This will swap branches between worktrees:");
        println!("  '{}': '{source_branch}' → '{target_branch}'", name_of(source_wt));
        println!("  '{}': '{target_branch}' → '{source_branch}'", name_of(target_wt));
        if !confirm("Continue?") {
            println!("Swap cancelled");
            return Ok(());
        }
    }

    cprintln!(
        "Swapping branches between <bold>{}</> and <bold>{}</>",
        name_of(source_wt),
        name_of(target_wt)
    );

    // Same single-checkout dance as a move:
    //   1. Detach HEAD in source (frees source_branch)
    //   2. Check out source_branch in target (frees target_branch)
    //   3. Check out target_branch in source
    git.worktree_at(source_wt).checkout_detached(&source_branch)?;
    git.worktree_at(target_wt).checkout_branch(&source_branch)?;
    git.worktree_at(source_wt).checkout_branch(&target_branch)?;

    cprintln!("<green>✓ Swapped <bold>{source_branch}</> ↔ <bold>{target_branch}</></>");
    Ok(())
}
