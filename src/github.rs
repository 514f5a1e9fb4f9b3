//! Review-host (GitHub) operations via the `gh` CLI.
//!
//! All reads degrade to empty results when `gh` is missing, unauthenticated,
//! or returns something unparseable: PR information is decoration, never a
//! prerequisite. Writes (PR merges) surface their failures.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::shell_exec::Cmd;

static PR_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https://github\.com/([^/]+)/([^/]+)/pull/\d+").unwrap());

/// State of a pull request as reported by the review host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

/// Information about one pull request.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    pub number: u64,
    pub state: PrState,
    pub url: String,
    pub is_draft: bool,
    /// `None` when no checks are configured or check status wasn't fetched
    /// (e.g. the record came from the Graphite cache).
    pub checks_passing: Option<bool>,
    pub owner: String,
    pub repo: String,
}

/// Parse owner and repo out of a GitHub PR URL.
///
/// `https://github.com/dagster-io/workstack/pull/23` → `("dagster-io", "workstack")`
pub fn parse_github_pr_url(url: &str) -> Option<(String, String)> {
    let caps = PR_URL_RE.captures(url)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// One entry from `gh pr list --json ...`.
#[derive(Debug, Deserialize)]
struct GhPr {
    number: u64,
    #[serde(rename = "headRefName")]
    head_ref_name: String,
    url: String,
    state: PrState,
    #[serde(rename = "isDraft")]
    is_draft: bool,
    #[serde(rename = "statusCheckRollup", default)]
    status_check_rollup: Option<Vec<GhCheck>>,
}

/// A single check from `statusCheckRollup`.
#[derive(Debug, Deserialize)]
struct GhCheck {
    /// "COMPLETED", "IN_PROGRESS", "QUEUED", ...
    status: Option<String>,
    /// "SUCCESS", "FAILURE", "SKIPPED", "NEUTRAL", ...
    conclusion: Option<String>,
}

/// Derive the overall check status for a PR.
///
/// `None` when no checks are configured; `Some(true)` only when every check
/// is COMPLETED with a SUCCESS/SKIPPED/NEUTRAL conclusion.
fn determine_checks_status(rollup: &[GhCheck]) -> Option<bool> {
    if rollup.is_empty() {
        return None;
    }
    for check in rollup {
        if check.status.as_deref() != Some("COMPLETED") {
            return Some(false);
        }
        match check.conclusion.as_deref() {
            Some("SUCCESS") | Some("SKIPPED") | Some("NEUTRAL") => {}
            _ => return Some(false),
        }
    }
    Some(true)
}

fn run_gh_json<T: serde::de::DeserializeOwned>(repo_root: &Path, args: &[&str]) -> Option<T> {
    let output = match Cmd::new("gh")
        .args(args.iter().copied())
        .current_dir(repo_root)
        .run()
    {
        Ok(output) => output,
        Err(e) => {
            log::debug!("gh failed to execute: {e}");
            return None;
        }
    };

    if !output.status.success() {
        log::debug!(
            "gh {} exited nonzero: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    match serde_json::from_slice(&output.stdout) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::debug!("gh returned unparseable JSON: {e}");
            None
        }
    }
}

/// Fetch PR information for all branches in one batch call.
///
/// `include_checks` controls whether `statusCheckRollup` is requested (one
/// more round trip's worth of data on GitHub's side, noticeably slower).
/// Returns an empty map when `gh` is unavailable.
pub fn get_prs_for_repo(repo_root: &Path, include_checks: bool) -> HashMap<String, PullRequest> {
    let mut json_fields = "number,headRefName,url,state,isDraft".to_string();
    if include_checks {
        json_fields.push_str(",statusCheckRollup");
    }

    let Some(prs_data) = run_gh_json::<Vec<GhPr>>(
        repo_root,
        &["pr", "list", "--state", "all", "--json", &json_fields],
    ) else {
        return HashMap::new();
    };

    let mut prs = HashMap::new();
    for pr in prs_data {
        // Skip PRs with malformed URLs (shouldn't happen in practice)
        let Some((owner, repo)) = parse_github_pr_url(&pr.url) else {
            continue;
        };

        let checks_passing = if include_checks {
            determine_checks_status(pr.status_check_rollup.as_deref().unwrap_or_default())
        } else {
            None
        };

        prs.insert(
            pr.head_ref_name.clone(),
            PullRequest {
                number: pr.number,
                state: pr.state,
                url: pr.url,
                is_draft: pr.is_draft,
                checks_passing,
                owner,
                repo,
            },
        );
    }
    prs
}

#[derive(Debug, Deserialize)]
struct GhPrSummary {
    number: u64,
    state: PrState,
    title: String,
}

/// PR state for a single branch: `(state, number, title)`, or `None` when no
/// PR exists (or `gh` is unavailable).
pub fn get_pr_status(repo_root: &Path, branch: &str) -> Option<(PrState, u64, String)> {
    let prs: Vec<GhPrSummary> = run_gh_json(
        repo_root,
        &[
            "pr",
            "list",
            "--head",
            branch,
            "--state",
            "all",
            "--json",
            "number,state,title",
            "--limit",
            "1",
        ],
    )?;
    let pr = prs.into_iter().next()?;
    Some((pr.state, pr.number, pr.title))
}

/// Squash-merge a PR. Unlike the reads above, failures here surface: the
/// user explicitly asked for a write.
pub fn merge_pr_squash(repo_root: &Path, number: u64) -> anyhow::Result<()> {
    if crate::shell_exec::is_dry_run() {
        crate::shell_exec::announce_dry_run(&["gh", "pr", "merge", &number.to_string(), "--squash"]);
        return Ok(());
    }
    let output = Cmd::new("gh")
        .args(["pr", "merge", &number.to_string(), "--squash"])
        .current_dir(repo_root)
        .run()
        .context("Failed to execute gh pr merge")?;
    if !output.status.success() {
        bail!(
            "gh pr merge failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
