//! `workstack land` - land a single PR from the bottom of a stack.
//!
//! Safely lands the current branch without touching upstack branches:
//! the branch's stack parent must be exactly the default branch, an open PR
//! must exist, and the merge is a squash. The outcome is printed as JSON so
//! agent tooling can consume it.

use clap::Args;
use serde::Serialize;

use crate::config::GlobalConfig;
use crate::git::{GitError, Repository};
use crate::github::PrState;
use crate::stack::{get_child_branches, get_parent_branch};
use crate::workspace::discover_repo_context;

#[derive(Debug, Args)]
pub struct LandArgs {
    /// Branch to land (default: current branch)
    #[arg(value_name = "BRANCH")]
    pub branch: Option<String>,
}

#[derive(Debug, Serialize)]
struct LandSuccess {
    success: bool,
    pr_number: u64,
    branch_name: String,
    child_branch: Option<String>,
    message: String,
}

#[derive(Debug, Serialize)]
struct LandError {
    success: bool,
    error_type: &'static str,
    message: String,
}

fn fail(error_type: &'static str, message: String) -> anyhow::Result<()> {
    let result = LandError {
        success: false,
        error_type,
        message,
    };
    println!("{}", serde_json::to_string_pretty(&result)?);
    std::process::exit(1);
}

pub fn run(args: LandArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = GlobalConfig::load()?;
    let repo = discover_repo_context(&cwd, &config)?;
    let git = Repository::discover(&cwd)?;

    let branch = match args.branch {
        Some(branch) => branch,
        None => git.worktree_at(&cwd).branch()?.ok_or(GitError::DetachedHead {
            action: Some("land".to_string()),
        })?,
    };

    let default_branch = git.default_branch()?;
    let branches = crate::graphite::get_all_branches(&git)?;
    let parent = get_parent_branch(&branches, &branch);

    if parent.as_deref() != Some(default_branch.as_str()) {
        return fail(
            "parent_not_main",
            format!(
                "Branch '{branch}' has parent {:?}, expected '{default_branch}'. Only branches directly on the default branch can be landed.",
                parent.as_deref().unwrap_or("<none>")
            ),
        );
    }

    let Some((state, pr_number, _title)) = crate::github::get_pr_status(&repo.root, &branch) else {
        return fail("no_pr_found", format!("No pull request found for branch '{branch}'"));
    };
    if state != PrState::Open {
        return fail(
            "pr_not_open",
            format!("PR #{pr_number} for branch '{branch}' is {state}, expected OPEN"),
        );
    }

    if let Err(e) = crate::github::merge_pr_squash(&repo.root, pr_number) {
        return fail("merge_failed", format!("Failed to merge PR #{pr_number}: {e}"));
    }

    // Navigation hint: only when exactly one child exists
    let children = get_child_branches(&branches, &branch);
    let child_branch = match children.as_slice() {
        [only] => Some(only.clone()),
        _ => None,
    };

    let result = LandSuccess {
        success: true,
        pr_number,
        branch_name: branch.clone(),
        child_branch,
        message: format!("Successfully merged PR #{pr_number} for branch {branch}"),
    };
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
