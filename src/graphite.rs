//! Graphite (stack tool) integration.
//!
//! Graphite organizes branches into stacks - linear chains of dependent
//! branches built on top of each other. It keeps a persistent cache of
//! branch relationships in the shared git directory:
//!
//! - `.graphite_cache_persist` - the branch forest:
//!   ```json
//!   {"branches": [
//!     ["main", {"validationResult": "TRUNK", "children": ["feat-1"]}],
//!     ["feat-1", {"parentBranchName": "main", "children": []}]
//!   ]}
//!   ```
//!   `validationResult: "TRUNK"` marks trunk; `parentBranchName` is null for
//!   trunk branches.
//!
//! - `.graphite_pr_info` - cached PR state (no CI signal):
//!   ```json
//!   {"prInfos": [{"headRefName": "feat-1", "url": "...", "prNumber": 7,
//!                 "state": "OPEN", "isDraft": false}]}
//!   ```
//!
//! This module only reads those files and shells out to `gt` for writes; it
//! never maintains stack state of its own.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, bail};
use serde_json::Value;

use crate::git::Repository;
use crate::github::{PullRequest, parse_github_pr_url};
use crate::shell_exec::{Cmd, announce_dry_run, execute_streaming, is_dry_run};

/// Metadata for one branch the stack tool tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchMetadata {
    pub name: String,
    /// Parent branch, or `None` for trunk candidates.
    pub parent: Option<String>,
    /// Ordered children; the first child is the default next in a stack.
    pub children: Vec<String>,
    pub is_trunk: bool,
    /// Tip SHA from git; empty when the branch was deleted out from under
    /// the cache.
    pub commit_sha: String,
}

/// Whether the `gt` binary is installed.
pub fn gt_available() -> bool {
    which::which("gt").is_ok()
}

fn cache_file(repo: &Repository) -> std::path::PathBuf {
    repo.git_common_dir().join(".graphite_cache_persist")
}

fn pr_info_file(repo: &Repository) -> std::path::PathBuf {
    repo.git_common_dir().join(".graphite_pr_info")
}

/// Parse the cache JSON into branch metadata, enriched with tip SHAs.
///
/// Malformed entries are tolerated field-by-field: a non-string parent reads
/// as no parent, a non-list children as no children. Only undecodable JSON
/// is an error.
pub fn parse_graphite_cache(
    json_str: &str,
    branch_heads: &HashMap<String, String>,
) -> anyhow::Result<HashMap<String, BranchMetadata>> {
    let data: Value = serde_json::from_str(json_str).context("Invalid JSON in Graphite cache")?;

    let mut result = HashMap::new();
    let branches = data
        .get("branches")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for entry in branches {
        let Some(pair) = entry.as_array() else { continue };
        let (Some(name), Some(info)) = (pair.first().and_then(Value::as_str), pair.get(1)) else {
            continue;
        };
        if !info.is_object() {
            continue;
        }

        let parent = info
            .get("parentBranchName")
            .and_then(Value::as_str)
            .map(str::to_string);
        let children = info
            .get("children")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let is_trunk = info.get("validationResult").and_then(Value::as_str) == Some("TRUNK");

        result.insert(
            name.to_string(),
            BranchMetadata {
                name: name.to_string(),
                parent,
                children,
                is_trunk,
                commit_sha: branch_heads.get(name).cloned().unwrap_or_default(),
            },
        );
    }

    Ok(result)
}

/// All gt-tracked branches with metadata, or an empty map when the cache
/// file doesn't exist.
pub fn get_all_branches(repo: &Repository) -> anyhow::Result<HashMap<String, BranchMetadata>> {
    let cache = cache_file(repo);
    if !cache.exists() {
        return Ok(HashMap::new());
    }
    let json_str = std::fs::read_to_string(&cache)
        .with_context(|| format!("Failed to read {}", cache.display()))?;

    // The cache doesn't store commit SHAs; ask git for each tracked branch
    let data: Value = serde_json::from_str(&json_str)
        .with_context(|| format!("Cannot parse Graphite cache at {}", cache.display()))?;
    let mut branch_heads = HashMap::new();
    if let Some(branches) = data.get("branches").and_then(Value::as_array) {
        for entry in branches {
            if let Some(name) = entry.as_array().and_then(|p| p.first()).and_then(Value::as_str)
                && let Some(sha) = repo.branch_head(name)
            {
                branch_heads.insert(name.to_string(), sha);
            }
        }
    }

    parse_graphite_cache(&json_str, &branch_heads)
}

/// Branch names the cache marks as trunk.
pub fn trunk_branches(repo: &Repository) -> anyhow::Result<std::collections::HashSet<String>> {
    Ok(get_all_branches(repo)?
        .into_iter()
        .filter(|(_, meta)| meta.is_trunk)
        .map(|(name, _)| name)
        .collect())
}

/// Convert a Graphite PR URL to the GitHub form.
///
/// `https://app.graphite.dev/github/pr/dagster-io/workstack/42`
/// → `https://github.com/dagster-io/workstack/pull/42`
fn graphite_url_to_github_url(graphite_url: &str) -> String {
    let parts: Vec<&str> = graphite_url.split('/').collect();
    if parts.len() >= 8 && parts.get(2) == Some(&"app.graphite.dev") {
        return format!("https://github.com/{}/{}/pull/{}", parts[5], parts[6], parts[7]);
    }
    graphite_url.to_string()
}

/// Graphite PR URL for a pull request.
pub fn graphite_url(owner: &str, repo: &str, pr_number: u64) -> String {
    format!("https://app.graphite.dev/github/pr/{owner}/{repo}/{pr_number}")
}

#[derive(Debug, serde::Deserialize)]
struct GraphitePrInfo {
    #[serde(rename = "headRefName")]
    head_ref_name: String,
    url: String,
    #[serde(rename = "prNumber")]
    pr_number: u64,
    state: crate::github::PrState,
    #[serde(rename = "isDraft")]
    is_draft: bool,
}

/// Parse the `.graphite_pr_info` JSON into PR records.
///
/// `checks_passing` is always `None`: the cache carries no CI signal.
pub fn parse_graphite_pr_info(json_str: &str) -> anyhow::Result<HashMap<String, PullRequest>> {
    let data: Value = serde_json::from_str(json_str).context("Invalid JSON in Graphite PR info")?;

    let mut prs = HashMap::new();
    let infos = data
        .get("prInfos")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for raw in infos {
        // Skip records in shapes this tool doesn't know
        let Ok(info) = serde_json::from_value::<GraphitePrInfo>(raw) else {
            continue;
        };
        let github_url = graphite_url_to_github_url(&info.url);
        let Some((owner, repo)) = parse_github_pr_url(&github_url) else {
            continue;
        };
        prs.insert(
            info.head_ref_name.clone(),
            PullRequest {
                number: info.pr_number,
                state: info.state,
                url: github_url,
                is_draft: info.is_draft,
                checks_passing: None,
                owner,
                repo,
            },
        );
    }

    Ok(prs)
}

/// PR records from Graphite's local cache - the fast path when CI status is
/// not required. Empty map when the file doesn't exist.
pub fn get_prs_from_graphite(repo: &Repository) -> anyhow::Result<HashMap<String, PullRequest>> {
    let path = pr_info_file(repo);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let json_str =
        std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_graphite_pr_info(&json_str)
}

/// Run `gt sync` to synchronize with the remote. Output streams straight to
/// the terminal so it never leaks into a script the shell wrapper sources.
pub fn sync(repo_root: &Path, force: bool) -> anyhow::Result<()> {
    if is_dry_run() {
        if force {
            announce_dry_run(&["gt", "sync", "-f"]);
        } else {
            announce_dry_run(&["gt", "sync"]);
        }
        return Ok(());
    }
    let command = if force { "gt sync -f" } else { "gt sync" };
    execute_streaming(command, repo_root)
}

/// Create a gt-tracked branch at the current HEAD.
///
/// The caller must ensure no staged changes exist: `gt create
/// --no-interactive` tries to commit staged files and fails without a
/// message.
pub fn create_branch(cwd: &Path, branch: &str) -> anyhow::Result<()> {
    if is_dry_run() {
        announce_dry_run(&["gt", "create", "--no-interactive", branch]);
        return Ok(());
    }
    let output = Cmd::new("gt")
        .args(["create", "--no-interactive", branch])
        .current_dir(cwd)
        .run()
        .context("Failed to execute gt create")?;
    if !output.status.success() {
        bail!(
            "gt create failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Delete a branch via gt so the stack metadata stays consistent.
/// Falls back to plain git when gt is not installed.
pub fn delete_branch(repo: &Repository, branch: &str, force: bool) -> anyhow::Result<()> {
    if !gt_available() {
        return repo.delete_branch(branch, force);
    }
    let mut args = vec!["branch", "delete", branch];
    if force {
        args.push("--force");
    }
    if is_dry_run() {
        let mut argv = vec!["gt"];
        argv.extend(args.iter().copied());
        announce_dry_run(&argv);
        return Ok(());
    }
    let output = Cmd::new("gt")
        .args(args)
        .current_dir(repo.repo_root())
        .run()
        .context("Failed to execute gt branch delete")?;
    if !output.status.success() {
        bail!(
            "gt branch delete failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
