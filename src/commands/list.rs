//! `workstack list` - list worktrees, optionally with their stacks.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::Args;
use color_print::cformat;

use crate::config::GlobalConfig;
use crate::git::Repository;
use crate::github::PullRequest;
use crate::graphite::BranchMetadata;
use crate::plan::{PLAN_FILENAME, extract_plan_title};
use crate::stack::{filter_stack_for_worktree, get_branch_stack};
use crate::workspace::discover_repo_context;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Show graphite stacks for each worktree
    #[arg(short, long)]
    pub stacks: bool,

    /// Show CI check status (requires a GitHub API call)
    #[arg(short, long)]
    pub checks: bool,
}

pub fn run(args: ListArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = GlobalConfig::load()?;
    let repo = discover_repo_context(&cwd, &config)?;
    let git = Repository::discover(&cwd)?;

    if args.stacks && !config.use_graphite {
        bail!("--stacks requires graphite to be enabled. Run 'workstack config set use_graphite true'");
    }

    let worktrees = git.list_worktrees()?;
    let branches_by_path: HashMap<PathBuf, Option<String>> = worktrees
        .iter()
        .map(|wt| (resolve(&wt.path), wt.branch.clone()))
        .collect();
    let checked_out: HashSet<String> = worktrees.iter().filter_map(|wt| wt.branch.clone()).collect();

    let current_dir = resolve(&cwd);
    let current_worktree = branches_by_path
        .keys()
        .filter(|path| current_dir.starts_with(path))
        .max_by_key(|path| path.components().count())
        .cloned();

    let stack_branches = if args.stacks {
        Some(crate::graphite::get_all_branches(&git)?)
    } else {
        None
    };

    // PR info: the Graphite cache is the fast path; GitHub is consulted when
    // CI status is wanted (or the cache is empty)
    let prs: Option<HashMap<String, PullRequest>> = if config.show_pr_info {
        let need_checks = args.checks || config.show_pr_checks;
        if need_checks {
            Some(crate::github::get_prs_for_repo(&repo.root, true))
        } else {
            let cached = crate::graphite::get_prs_from_graphite(&git).unwrap_or_default();
            if cached.is_empty() {
                Some(crate::github::get_prs_for_repo(&repo.root, false))
            } else {
                Some(cached)
            }
        }
    } else {
        None
    };

    // Root repo first, displayed under the reserved name
    let root_resolved = resolve(&repo.root);
    let root_branch = branches_by_path.get(&root_resolved).cloned().flatten();
    let is_current_root = current_worktree.as_deref() == Some(root_resolved.as_path());
    println!(
        "{}",
        format_worktree_line("root", &repo.root, is_current_root, true)
    );
    if args.stacks {
        print_plan_summary(&repo.root);
        if let (Some(branches), Some(branch)) = (&stack_branches, &root_branch) {
            print_branch_stack(branches, branch, &root_branch, &checked_out, true, prs.as_ref());
        }
    }

    if !repo.workstacks_dir.exists() {
        return Ok(());
    }
    let mut entries: Vec<PathBuf> = std::fs::read_dir(&repo.workstacks_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    entries.sort();

    for path in &entries {
        let resolved = resolve(path);
        let wt_branch = branches_by_path.get(&resolved).cloned().flatten();

        if args.stacks {
            println!();
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let is_current = current_worktree.as_deref() == Some(resolved.as_path());
        println!("{}", format_worktree_line(&name, path, is_current, false));

        if args.stacks {
            print_plan_summary(path);
            if let (Some(branches), Some(branch)) = (&stack_branches, &wt_branch) {
                print_branch_stack(branches, branch, &wt_branch, &checked_out, false, prs.as_ref());
            }
        }
    }

    Ok(())
}

fn resolve(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn format_worktree_line(name: &str, path: &Path, is_current: bool, is_root: bool) -> String {
    // Root gets green to stand apart from regular worktrees
    let name_part = if is_root {
        cformat!("<green><bold>{name}</></>")
    } else {
        cformat!("<cyan><bold>{name}</></>")
    };
    let location_part = cformat!("<white><dim>[{}]</></>", path.display());

    let mut line = format!("{name_part} {location_part}");
    if is_current {
        line.push_str(&cformat!("<bright-blue> ← (cwd)</>"));
    }
    line
}

fn print_plan_summary(worktree_path: &Path) {
    if let Some(title) = extract_plan_title(&worktree_path.join(PLAN_FILENAME)) {
        println!("  📋 {}", cformat!("<bright-magenta>{title}</>"));
    }
}

fn print_branch_stack(
    branches: &HashMap<String, BranchMetadata>,
    branch: &str,
    current_branch: &Option<String>,
    checked_out: &HashSet<String>,
    is_root_worktree: bool,
    prs: Option<&HashMap<String, PullRequest>>,
) {
    let Some(stack) = get_branch_stack(branches, branch) else {
        return;
    };
    let filtered =
        filter_stack_for_worktree(&stack, current_branch.as_deref(), checked_out, is_root_worktree);

    // Leaf first, trunk last
    for branch_name in filtered.iter().rev() {
        let is_current = current_branch.as_deref() == Some(branch_name.as_str());
        let (marker, branch_text) = if is_current {
            (cformat!("<bright-green>◉</>"), cformat!("<bright-green><bold>{branch_name}</></>"))
        } else {
            (cformat!("<bright-black>◯</>"), branch_name.clone())
        };

        match prs.and_then(|prs| prs.get(branch_name)).map(format_pr_info) {
            Some(pr_info) => println!("  {marker}  {branch_text} {pr_info}"),
            None => println!("  {marker}  {branch_text}"),
        }
    }
}

/// PR badge: status emoji + a clickable `#N` (OSC 8 hyperlink to the
/// Graphite view of the PR).
fn format_pr_info(pr: &PullRequest) -> String {
    let emoji = pr_status_emoji(pr);
    let url = crate::graphite::graphite_url(&pr.owner, &pr.repo, pr.number);
    let pr_text = cformat!("<cyan>#{}</>", pr.number);
    format!("{emoji} \u{1b}]8;;{url}\u{1b}\\{pr_text}\u{1b}]8;;\u{1b}\\")
}

fn pr_status_emoji(pr: &PullRequest) -> &'static str {
    use crate::github::PrState;

    if pr.is_draft {
        return "🚧";
    }
    match (pr.state, pr.checks_passing) {
        (PrState::Merged, _) => "🟣",
        (PrState::Closed, _) => "⭕",
        (PrState::Open, Some(true)) => "✅",
        (PrState::Open, Some(false)) => "❌",
        // Open PR with no check signal
        (PrState::Open, None) => "◯",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::PrState;

    fn pr(state: PrState, is_draft: bool, checks: Option<bool>) -> PullRequest {
        PullRequest {
            number: 5,
            state,
            url: "https://github.com/o/r/pull/5".into(),
            is_draft,
            checks_passing: checks,
            owner: "o".into(),
            repo: "r".into(),
        }
    }

    #[test]
    fn test_pr_status_emoji() {
        assert_eq!(pr_status_emoji(&pr(PrState::Open, true, None)), "🚧");
        assert_eq!(pr_status_emoji(&pr(PrState::Merged, false, None)), "🟣");
        assert_eq!(pr_status_emoji(&pr(PrState::Closed, false, None)), "⭕");
        assert_eq!(pr_status_emoji(&pr(PrState::Open, false, Some(true))), "✅");
        assert_eq!(pr_status_emoji(&pr(PrState::Open, false, Some(false))), "❌");
        assert_eq!(pr_status_emoji(&pr(PrState::Open, false, None)), "◯");
    }

    #[test]
    fn test_pr_info_links_to_graphite() {
        let formatted = format_pr_info(&pr(PrState::Open, false, None));
        assert!(formatted.contains("app.graphite.dev/github/pr/o/r/5"));
        assert!(formatted.contains("#5"));
    }
}
