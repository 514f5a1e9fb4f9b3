//! `workstack status` - one degraded-gracefully report per worktree.

use clap::Args;
use color_print::cprintln;

use crate::config::GlobalConfig;
use crate::git::Repository;
use crate::status::{StatusContext, StatusOrchestrator, StatusSnapshot, default_collectors};
use crate::workspace::discover_repo_context;

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Per-collector timeout in seconds
    #[arg(long, default_value_t = 2.0, value_name = "SECONDS")]
    pub timeout: f64,
}

pub fn run(args: StatusArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = GlobalConfig::load()?;
    let repo = discover_repo_context(&cwd, &config)?;
    let git = Repository::discover(&cwd)?;

    let ctx = StatusContext {
        repo: git,
        config,
        repo_root: repo.root.clone(),
        worktree_path: cwd,
    };

    let orchestrator = StatusOrchestrator::new(default_collectors())
        .with_timeout(std::time::Duration::from_secs_f64(args.timeout));
    let snapshot = orchestrator.collect(&ctx);

    render(&snapshot);
    Ok(())
}

/// Sections render in a fixed order regardless of collector completion
/// order; absent sections are skipped.
fn render(snapshot: &StatusSnapshot) {
    let wt = &snapshot.worktree;
    cprintln!("<cyan><bold>{}</></> <dim>[{}]</>", wt.name, wt.path.display());
    if let Some(ref branch) = wt.branch {
        cprintln!("  Branch: <yellow>{branch}</>");
    } else {
        cprintln!("  Branch: <dim>(detached HEAD)</>");
    }

    if let Some(ref git) = snapshot.git {
        println!();
        cprintln!("<cyan>GIT</>");
        println!("  HEAD: {}", &git.head_sha[..8.min(git.head_sha.len())]);
        if git.is_dirty {
            cprintln!("  Working tree: <yellow>dirty</>");
        } else {
            cprintln!("  Working tree: <green>clean</>");
        }
        if git.has_staged_changes {
            println!("  Staged changes: yes");
        }
        if git.ahead > 0 || git.behind > 0 {
            println!("  vs default branch: ↑{} ↓{}", git.ahead, git.behind);
        }
    }

    if let Some(ref stack) = snapshot.stack {
        println!();
        cprintln!("<cyan>STACK</>");
        for (i, branch) in stack.stack.iter().enumerate().rev() {
            if i == stack.position {
                cprintln!("  <bright-green>◉</>  <bright-green><bold>{branch}</></>");
            } else {
                cprintln!("  <bright-black>◯</>  {branch}");
            }
        }
    }

    if let Some(ref pr) = snapshot.pr {
        println!();
        cprintln!("<cyan>PULL REQUEST</>");
        println!("  #{} {} - {}", pr.number, pr.state, pr.title);
    }

    if let Some(ref env) = snapshot.environment {
        println!();
        cprintln!("<cyan>ENVIRONMENT</>");
        println!("  .env: {}", if env.has_env_file { "present" } else { "absent" });
        println!("  .venv: {}", if env.has_venv { "present" } else { "absent" });
    }

    if let Some(ref deps) = snapshot.dependencies
        && !deps.lockfiles.is_empty()
    {
        println!();
        cprintln!("<cyan>DEPENDENCIES</>");
        for lockfile in &deps.lockfiles {
            println!("  {lockfile}");
        }
    }

    if let Some(ref plan) = snapshot.plan {
        println!();
        cprintln!("<cyan>PLAN</>");
        cprintln!("  📋 <bright-magenta>{}</>", plan.title);
    }

    if !snapshot.related_worktrees.is_empty() {
        println!();
        cprintln!("<cyan>RELATED WORKTREES</>");
        for related in &snapshot.related_worktrees {
            match &related.branch {
                Some(branch) => cprintln!("  <bold>{}</> <yellow>[{branch}]</>", related.name),
                None => cprintln!("  <bold>{}</> <dim>(detached)</>", related.name),
            }
        }
    }
}
