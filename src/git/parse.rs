//! Parsing of `git worktree list --porcelain` output

use std::path::PathBuf;

use super::Worktree;

/// Parse the porcelain worktree listing into [`Worktree`] records.
///
/// The format is a sequence of key/value blocks separated by blank lines:
///
/// ```text
/// worktree /path/to/repo
/// HEAD abcdef0123456789
/// branch refs/heads/main
///
/// worktree /path/to/repo/../wt
/// HEAD fedcba9876543210
/// detached
/// ```
pub(crate) fn parse_worktree_porcelain(output: &str) -> Vec<Worktree> {
    let mut worktrees = Vec::new();
    let mut current: Option<Worktree> = None;

    for line in output.lines() {
        let line = line.trim_end();

        if line.is_empty() {
            if let Some(wt) = current.take() {
                worktrees.push(wt);
            }
            continue;
        }

        if let Some(path) = line.strip_prefix("worktree ") {
            // A new block can start without a separating blank line at EOF edge
            if let Some(wt) = current.take() {
                worktrees.push(wt);
            }
            current = Some(Worktree {
                path: PathBuf::from(path),
                head: String::new(),
                branch: None,
                detached: false,
                bare: false,
            });
            continue;
        }

        let Some(ref mut wt) = current else { continue };

        if let Some(head) = line.strip_prefix("HEAD ") {
            wt.head = head.to_string();
        } else if let Some(branch_ref) = line.strip_prefix("branch ") {
            wt.branch = Some(
                branch_ref
                    .strip_prefix("refs/heads/")
                    .unwrap_or(branch_ref)
                    .to_string(),
            );
        } else if line == "detached" {
            wt.detached = true;
        } else if line == "bare" {
            wt.bare = true;
        }
        // Unknown attributes (locked, prunable, ...) are ignored
    }

    if let Some(wt) = current {
        worktrees.push(wt);
    }

    worktrees
}
