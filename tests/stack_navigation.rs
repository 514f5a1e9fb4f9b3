//! Stack-aware navigation and landing, driven by a hand-written Graphite
//! cache.

mod common;

use common::{TestRepo, repo};
use rstest::rstest;

/// main ← b1 ← b2, with worktrees for b1 and b2.
fn setup_stack(repo: &TestRepo) {
    repo.write_global_config(&[("use_graphite", "true")]);
    repo.git(&["branch", "b1"]);
    repo.git(&["branch", "b2"]);
    repo.write_graphite_cache(&["b1", "b2"]);
    repo.workstack_ok(&["create", "--from-branch", "b1", "--no-post"]);
    repo.workstack_ok(&["create", "--from-branch", "b2", "--no-post"]);
}

#[rstest]
fn test_switch_up_targets_child_worktree(repo: TestRepo) {
    setup_stack(&repo);
    let b1 = repo.workstacks_dir().join("b1");

    let stdout = repo.workstack_in(&b1, &["switch", "--up", "--script"]);
    assert!(stdout.status.success());
    let script_path = String::from_utf8_lossy(&stdout.stdout).trim().to_string();
    let script = std::fs::read_to_string(script_path).unwrap();
    assert!(script.contains("b2"), "expected a cd into b2:\n{script}");
}

#[rstest]
fn test_switch_up_at_leaf_fails(repo: TestRepo) {
    setup_stack(&repo);
    let b2 = repo.workstacks_dir().join("b2");
    let output = repo.workstack_in(&b2, &["switch", "--up"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("top of the stack"), "stderr: {stderr}");
}

#[rstest]
fn test_switch_down_to_trunk_lands_on_root(repo: TestRepo) {
    setup_stack(&repo);
    let b1 = repo.workstacks_dir().join("b1");

    // b1's parent is main, which lives in the root repo
    let output = repo.workstack_in(&b1, &["switch", "--down", "--script"]);
    assert!(output.status.success());
    let script_path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let script = std::fs::read_to_string(script_path).unwrap();
    assert!(
        script.contains(&format!("cd '{}'", repo.root.display())),
        "expected a cd into the repo root:\n{script}"
    );
}

#[rstest]
fn test_switch_down_within_stack(repo: TestRepo) {
    setup_stack(&repo);
    let b2 = repo.workstacks_dir().join("b2");
    let output = repo.workstack_in(&b2, &["switch", "--down", "--script"]);
    assert!(output.status.success());
    let script_path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let script = std::fs::read_to_string(script_path).unwrap();
    assert!(script.contains("b1"), "expected a cd into b1:\n{script}");
}

#[rstest]
fn test_navigation_requires_graphite(repo: TestRepo) {
    // use_graphite stays false
    let output = repo.workstack(&["switch", "--up"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("use_graphite"), "stderr: {stderr}");
}

#[rstest]
fn test_list_with_stacks(repo: TestRepo) {
    setup_stack(&repo);
    let stdout = repo.workstack_ok(&["list", "--stacks"]);
    assert!(stdout.contains("root"));
    assert!(stdout.contains("b1"));
    assert!(stdout.contains("b2"));
}

#[rstest]
fn test_list_stacks_requires_graphite(repo: TestRepo) {
    let output = repo.workstack(&["list", "--stacks"]);
    assert!(!output.status.success());
}

// Landing a branch whose stack parent is not the default branch
#[rstest]
fn test_land_rejects_parent_not_main(repo: TestRepo) {
    setup_stack(&repo);
    let b2 = repo.workstacks_dir().join("b2");

    let output = repo.workstack_in(&b2, &["land"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let result: serde_json::Value = serde_json::from_str(&stdout).expect("land prints JSON");
    assert_eq!(result["success"], false);
    assert_eq!(result["error_type"], "parent_not_main");
}

#[rstest]
fn test_land_untracked_branch_rejected(repo: TestRepo) {
    repo.write_global_config(&[("use_graphite", "true")]);
    repo.write_graphite_cache(&[]);
    repo.git(&["checkout", "-q", "-b", "loose"]);

    let output = repo.workstack(&["land"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let result: serde_json::Value = serde_json::from_str(&stdout).expect("land prints JSON");
    assert_eq!(result["error_type"], "parent_not_main");
}

#[rstest]
fn test_status_command_degrades_gracefully(repo: TestRepo) {
    // No graphite, no PRs, no plan: status still succeeds with the git and
    // environment sections
    repo.workstack_ok(&["create", "feature-x", "--no-post"]);
    let wt = repo.workstacks_dir().join("feature-x");
    let output = repo.workstack_in(&wt, &["status"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("feature-x"));
    assert!(stdout.contains("GIT"));
    assert!(stdout.contains(".env: present"));
}
