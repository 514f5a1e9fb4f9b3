//! End-to-end coverage of `workstack remove`.

mod common;

use common::{TestRepo, repo};
use rstest::rstest;

#[rstest]
fn test_remove_force_deletes_directory(repo: TestRepo) {
    repo.workstack_ok(&["create", "feature-x", "--no-post"]);
    let wt_path = repo.workstacks_dir().join("feature-x");
    assert!(wt_path.is_dir());

    repo.workstack_ok(&["remove", "feature-x", "--force"]);

    assert!(!wt_path.exists());
    let branches = repo.checked_out_branches();
    assert!(
        !branches.iter().any(|(path, _)| path.ends_with("feature-x")),
        "git still lists the removed worktree: {branches:?}"
    );
}

#[rstest]
fn test_remove_reserved_name_rejected(repo: TestRepo) {
    let output = repo.workstack(&["remove", "root", "--force"]);
    assert!(!output.status.success());
}

#[rstest]
fn test_remove_missing_worktree_rejected(repo: TestRepo) {
    let output = repo.workstack(&["remove", "no-such-worktree", "--force"]);
    assert!(!output.status.success());
}

#[rstest]
fn test_remove_without_force_aborts_on_eof(repo: TestRepo) {
    repo.workstack_ok(&["create", "feature-x", "--no-post"]);
    // stdin is closed, so the confirmation reads as "no"
    repo.workstack_ok(&["remove", "feature-x"]);
    assert!(repo.workstacks_dir().join("feature-x").is_dir());
}

#[rstest]
fn test_remove_dry_run_leaves_everything(repo: TestRepo) {
    repo.workstack_ok(&["create", "feature-x", "--no-post"]);
    let wt_path = repo.workstacks_dir().join("feature-x");

    let stdout = repo.workstack_ok(&["remove", "feature-x", "--dry-run"]);
    assert!(stdout.contains("[DRY RUN] Would run: git worktree remove"), "stdout: {stdout}");

    assert!(wt_path.is_dir(), "dry-run must not delete the worktree");
    let branches = repo.checked_out_branches();
    assert!(branches.iter().any(|(path, _)| path.ends_with("feature-x")));
}

// Remove with stack deletion
#[rstest]
fn test_remove_with_delete_stack(repo: TestRepo) {
    repo.write_global_config(&[("use_graphite", "true")]);

    // main ← b1 ← b2, with b2 checked out in a worktree
    repo.git(&["branch", "b1"]);
    repo.git(&["branch", "b2"]);
    repo.write_graphite_cache(&["b1", "b2"]);
    repo.workstack_ok(&["create", "--from-branch", "b2", "--no-post"]);

    repo.workstack_ok(&["remove", "b2", "--delete-stack", "--force"]);

    assert!(!repo.workstacks_dir().join("b2").exists());
    let branch_list = repo.git(&["branch", "--format=%(refname:short)"]);
    let branches: Vec<&str> = branch_list.lines().collect();
    assert!(!branches.contains(&"b1"), "b1 should be deleted: {branches:?}");
    assert!(!branches.contains(&"b2"), "b2 should be deleted: {branches:?}");
    assert!(branches.contains(&"main"), "main must be untouched: {branches:?}");
}

#[rstest]
fn test_delete_stack_requires_graphite(repo: TestRepo) {
    repo.git(&["branch", "b1"]);
    repo.workstack_ok(&["create", "--from-branch", "b1", "--no-post"]);

    let output = repo.workstack(&["remove", "b1", "--delete-stack", "--force"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("use_graphite"), "stderr: {stderr}");
}

#[rstest]
fn test_delete_stack_untracked_branch_still_removes_worktree(repo: TestRepo) {
    repo.write_global_config(&[("use_graphite", "true")]);
    repo.write_graphite_cache(&[]);

    repo.git(&["branch", "loose"]);
    repo.workstack_ok(&["create", "--from-branch", "loose", "--no-post"]);

    let output = repo.workstack(&["remove", "loose", "--delete-stack", "--force"]);
    assert!(output.status.success());
    // Warned and skipped stack deletion, but the worktree itself is gone
    assert!(!repo.workstacks_dir().join("loose").exists());
    let branch_list = repo.git(&["branch", "--format=%(refname:short)"]);
    assert!(branch_list.lines().any(|b| b == "loose"));
}
