//! `workstack remove` - delete a worktree, optionally with its stack.

use std::path::Path;

use anyhow::bail;
use clap::Args;
use color_print::cprintln;

use crate::config::GlobalConfig;
use crate::git::Repository;
use crate::styling::confirm;
use crate::workspace::{discover_repo_context, is_reserved_name, worktree_path_for};

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Worktree name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Do not prompt for confirmation
    #[arg(short, long)]
    pub force: bool,

    /// Delete all branches in the Graphite stack (requires Graphite)
    #[arg(short = 's', long)]
    pub delete_stack: bool,

    /// Print what would be done without executing destructive operations
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: RemoveArgs) -> anyhow::Result<()> {
    if args.dry_run {
        crate::shell_exec::set_dry_run(true);
    }

    if is_reserved_name(&args.name) {
        bail!("\"{}\" is a reserved name and cannot be removed.", args.name);
    }

    let cwd = std::env::current_dir()?;
    let config = GlobalConfig::load()?;
    let repo = discover_repo_context(&cwd, &config)?;
    let git = Repository::discover(&cwd)?;
    let wt_path = worktree_path_for(&repo.workstacks_dir, &args.name);

    if !wt_path.exists() || !wt_path.is_dir() {
        bail!("Worktree not found: {}", wt_path.display());
    }

    // Collect the full operation plan before touching anything
    let branches_to_delete = if args.delete_stack {
        collect_stack_branches(&git, &config, &args.name, &wt_path)?
    } else {
        Vec::new()
    };

    cprintln!("<bold>📋 Planning to perform the following operations:</>");
    cprintln!("  1. 🗑️  Remove worktree: <cyan>{}</>", wt_path.display());
    if !branches_to_delete.is_empty() {
        println!("  2. 🌳 Delete branches in stack:");
        for branch in &branches_to_delete {
            cprintln!("     - <yellow>{branch}</>");
        }
    }

    // One confirmation for the whole plan; no per-step prompts
    if !args.force && !args.dry_run && !confirm("Proceed with these operations?") {
        cprintln!("<red><bold>⭕ Aborted.</></>");
        return Ok(());
    }

    // Best-effort git removal first so git's metadata is updated when
    // possible. There is no reliable pre-check for whether this succeeds
    // (half-removed trees, stale locks), so failure just falls through to
    // the manual delete.
    if let Err(e) = git.remove_worktree(&wt_path, true) {
        log::debug!("git worktree remove failed, falling back to manual delete: {e}");
    }

    if wt_path.exists() {
        if args.dry_run {
            eprintln!("[DRY RUN] Would delete directory: {}", wt_path.display());
        } else {
            std::fs::remove_dir_all(&wt_path)?;
        }
    }

    // Cleanup only; "nothing to prune" is not worth reporting
    if !args.dry_run && let Err(e) = git.prune_worktrees() {
        log::debug!("git worktree prune failed: {e}");
    }

    for branch in &branches_to_delete {
        crate::graphite::delete_branch(&git, branch, args.force)?;
        if !args.dry_run {
            cprintln!("✅ Deleted branch: <green>{branch}</>");
        }
    }

    if !args.dry_run {
        cprintln!("✅ <green>{}</>", wt_path.display());
    }

    Ok(())
}

/// Branches scheduled for deletion with `--delete-stack`: the worktree
/// branch's stack, minus trunk branches. Warnings degrade to an empty
/// schedule; only a disabled Graphite config is an error.
fn collect_stack_branches(
    git: &Repository,
    config: &GlobalConfig,
    name: &str,
    wt_path: &Path,
) -> anyhow::Result<Vec<String>> {
    use crate::styling::warning_message;

    if !config.use_graphite {
        bail!(
            "--delete-stack requires Graphite to be enabled. Run 'workstack config set use_graphite true'"
        );
    }

    let resolved = dunce::canonicalize(wt_path).unwrap_or_else(|_| wt_path.to_path_buf());
    let worktree_branch = git
        .list_worktrees()?
        .into_iter()
        .find(|wt| {
            dunce::canonicalize(&wt.path).unwrap_or_else(|_| wt.path.clone()) == resolved
        })
        .and_then(|wt| wt.branch);

    let Some(worktree_branch) = worktree_branch else {
        eprintln!(
            "{}",
            warning_message(format!(
                "Worktree {name} is in detached HEAD state. Cannot delete stack without a branch."
            ))
        );
        return Ok(Vec::new());
    };

    let branches = crate::graphite::get_all_branches(git)?;
    let Some(stack) = crate::stack::get_branch_stack(&branches, &worktree_branch) else {
        eprintln!(
            "{}",
            warning_message(format!(
                "Branch {worktree_branch} is not tracked by Graphite. Cannot delete stack."
            ))
        );
        return Ok(Vec::new());
    };

    let trunks = crate::graphite::trunk_branches(git)?;
    let to_delete: Vec<String> = stack.into_iter().filter(|b| !trunks.contains(b)).collect();

    if to_delete.is_empty() {
        println!("No branches to delete (all branches in stack are trunk branches).");
    }

    Ok(to_delete)
}
