//! `workstack switch` - emit an activation script for a worktree.

use anyhow::bail;
use clap::Args;

use crate::activation::{render_activation_script, write_script_to_temp};
use crate::config::GlobalConfig;
use crate::git::{GitError, Repository};
use crate::stack::{find_worktree_for_branch, get_child_branches, get_parent_branch};
use crate::workspace::{discover_repo_context, worktree_path_for};

#[derive(Debug, Args)]
pub struct SwitchArgs {
    /// Worktree name, or 'root' for the repository root
    #[arg(value_name = "NAME")]
    pub name: Option<String>,

    /// Print only the activation script path
    #[arg(long)]
    pub script: bool,

    /// Move to the child branch in the Graphite stack
    #[arg(long)]
    pub up: bool,

    /// Move to the parent branch in the Graphite stack
    #[arg(long)]
    pub down: bool,
}

pub fn run(args: SwitchArgs) -> anyhow::Result<()> {
    if args.up && args.down {
        bail!("Cannot use both --up and --down");
    }
    if args.name.is_some() && (args.up || args.down) {
        bail!("Cannot specify NAME with --up or --down");
    }
    if args.name.is_none() && !args.up && !args.down {
        bail!("Must specify NAME, --up, or --down");
    }

    let cwd = std::env::current_dir()?;
    let config = GlobalConfig::load()?;

    if (args.up || args.down) && !config.use_graphite {
        bail!(
            "--up/--down requires Graphite to be enabled. Run 'workstack config set use_graphite true'"
        );
    }

    let repo = discover_repo_context(&cwd, &config)?;
    let git = Repository::discover(&cwd)?;

    let name = match args.name {
        Some(name) => {
            if name.eq_ignore_ascii_case("main") || name.eq_ignore_ascii_case("master") {
                bail!(
                    "\"{name}\" cannot be used as a worktree name.\nTo switch to the {name} branch in the root repository, use:\n  workstack switch root"
                );
            }
            name
        }
        None => navigate_stack(&git, &repo.root, args.up)?,
    };

    let (target_path, banner) = if name == "root" {
        (repo.root.clone(), "Switched to root repo")
    } else {
        let wt_path = worktree_path_for(&repo.workstacks_dir, &name);
        if !wt_path.exists() {
            bail!("Worktree not found: {}", wt_path.display());
        }
        (wt_path, "Activated worktree")
    };

    if args.script {
        let script = render_activation_script(&target_path, banner);
        let script_path = write_script_to_temp(&script, "switch")?;
        print!("{}", script_path.display());
        use std::io::Write;
        std::io::stdout().flush()?;
    } else {
        println!(
            "Shell integration not detected. Run 'workstack init <shell>' to set up automatic activation."
        );
        println!("\nOr use: source \"$(workstack switch {name} --script)\"");
    }

    Ok(())
}

/// Resolve `--up`/`--down` to a worktree name via the stack tool's metadata.
fn navigate_stack(
    git: &Repository,
    repo_root: &std::path::Path,
    up: bool,
) -> anyhow::Result<String> {
    let cwd = std::env::current_dir()?;
    let current_branch = git.worktree_at(&cwd).branch()?.ok_or(GitError::DetachedHead {
        action: Some("switch --up/--down".to_string()),
    })?;

    let branches = crate::graphite::get_all_branches(git)?;
    let worktrees = git.list_worktrees()?;

    if up {
        let children = get_child_branches(&branches, &current_branch);
        let Some(target_branch) = children.first() else {
            bail!("Already at the top of the stack (no child branches)");
        };
        // Multiple children: the first child is the default next in a stack
        let Some(wt_path) = find_worktree_for_branch(&worktrees, target_branch) else {
            bail!(
                "Branch '{target_branch}' is the next branch up in the stack but has no worktree.\nTo create a worktree for it, run:\n  workstack create --from-branch {target_branch}"
            );
        };
        return Ok(worktree_name(wt_path));
    }

    let Some(parent_branch) = get_parent_branch(&branches, &current_branch) else {
        let trunk = git.default_branch()?;
        if current_branch == trunk {
            bail!("Already at the bottom of the stack (on trunk branch '{trunk}')");
        }
        bail!("Could not determine parent branch from Graphite metadata");
    };

    let trunk = git.default_branch()?;
    if parent_branch == trunk {
        // When trunk lives in the root repository (not a dedicated
        // worktree), going down lands on `root`
        let root_resolved =
            dunce::canonicalize(repo_root).unwrap_or_else(|_| repo_root.to_path_buf());
        match find_worktree_for_branch(&worktrees, &trunk) {
            Some(path)
                if dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
                    == root_resolved =>
            {
                return Ok("root".to_string());
            }
            Some(path) => return Ok(worktree_name(path)),
            None => {
                bail!(
                    "Branch '{parent_branch}' is the parent branch but has no worktree.\nTo switch to the root repository, run:\n  workstack switch root"
                );
            }
        }
    }

    let Some(wt_path) = find_worktree_for_branch(&worktrees, &parent_branch) else {
        bail!(
            "Branch '{parent_branch}' is the parent branch but has no worktree.\nTo create a worktree for it, run:\n  workstack create --from-branch {parent_branch}"
        );
    };
    Ok(worktree_name(wt_path))
}

fn worktree_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string())
}
