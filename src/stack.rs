//! Pure stack navigation algorithms over the stack tool's branch metadata.
//!
//! Nothing in here touches disk or subprocesses; the facade in
//! [`crate::graphite`] loads the metadata, these functions answer questions
//! about it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::git::Worktree;
use crate::graphite::BranchMetadata;

/// The linear stack a branch belongs to, ordered from trunk to leaf.
///
/// Ancestors are collected by walking `parent` pointers until a trunk or a
/// branch missing from the cache is reached; descendants by following
/// `children[0]` until a leaf. Siblings off the first-child chain do not
/// appear.
///
/// Returns `None` when `branch` is not tracked.
pub fn get_branch_stack(
    branches: &HashMap<String, BranchMetadata>,
    branch: &str,
) -> Option<Vec<String>> {
    if !branches.contains_key(branch) {
        return None;
    }

    // current → parent → ... → trunk
    let mut ancestors: Vec<String> = Vec::new();
    let mut current = branch;
    loop {
        ancestors.push(current.to_string());
        match branches.get(current).and_then(|meta| meta.parent.as_deref()) {
            Some(parent) if branches.contains_key(parent) => current = parent,
            _ => break,
        }
    }
    ancestors.reverse();

    // current → children[0] → ... → leaf
    let mut descendants: Vec<String> = Vec::new();
    let mut current = branch;
    while let Some(first_child) = branches
        .get(current)
        .and_then(|meta| meta.children.first())
        .map(String::as_str)
    {
        if !branches.contains_key(first_child) {
            break;
        }
        descendants.push(first_child.to_string());
        current = first_child;
    }

    ancestors.extend(descendants);
    Some(ancestors)
}

/// Parent of a branch, or `None` for trunk / untracked branches.
pub fn get_parent_branch(
    branches: &HashMap<String, BranchMetadata>,
    branch: &str,
) -> Option<String> {
    branches.get(branch)?.parent.clone()
}

/// Children of a branch, in stack order. Empty for leaves and untracked
/// branches.
pub fn get_child_branches(branches: &HashMap<String, BranchMetadata>, branch: &str) -> Vec<String> {
    branches
        .get(branch)
        .map(|meta| meta.children.clone())
        .unwrap_or_default()
}

/// Whether a branch is a trunk (marked as such, or parentless).
///
/// Untracked branches read as not-trunk: when the cache can't answer, the
/// conservative answer is "no".
pub fn is_trunk_branch(branches: &HashMap<String, BranchMetadata>, branch: &str) -> bool {
    branches
        .get(branch)
        .map(|meta| meta.is_trunk || meta.parent.is_none())
        .unwrap_or(false)
}

/// Filter a stack down to the branches worth showing for one worktree.
///
/// - Root worktree: ancestors + current only (no descendants).
/// - Other worktrees: ancestors + current, plus descendants that are checked
///   out in some worktree. Descendants without a worktree would just be
///   clutter.
///
/// When the current branch isn't in the stack (shouldn't happen), the full
/// stack is returned.
pub fn filter_stack_for_worktree(
    stack: &[String],
    current_branch: Option<&str>,
    checked_out_branches: &HashSet<String>,
    is_root_worktree: bool,
) -> Vec<String> {
    let Some(current_idx) = current_branch.and_then(|b| stack.iter().position(|s| s == b)) else {
        return stack.to_vec();
    };

    if is_root_worktree {
        return stack[..=current_idx].to_vec();
    }

    stack
        .iter()
        .enumerate()
        .filter(|(i, branch)| *i <= current_idx || checked_out_branches.contains(*branch))
        .map(|(_, branch)| branch.clone())
        .collect()
}

/// The worktree holding `branch`, if any. First match wins.
pub fn find_worktree_for_branch<'a>(worktrees: &'a [Worktree], branch: &str) -> Option<&'a Path> {
    worktrees
        .iter()
        .find(|wt| wt.branch.as_deref() == Some(branch))
        .map(|wt| wt.path.as_path())
}
