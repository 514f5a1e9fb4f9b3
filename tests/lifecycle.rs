//! End-to-end coverage of create / switch / move.

mod common;

use common::{TestRepo, repo};
use rstest::rstest;

// Create + switch round-trip
#[rstest]
fn test_create_then_switch_script(repo: TestRepo) {
    repo.workstack_ok(&["create", "feature-x", "--no-post"]);

    let wt_path = repo.workstacks_dir().join("feature-x");
    assert!(wt_path.is_dir(), "worktree directory missing");

    let branches = repo.checked_out_branches();
    assert!(
        branches
            .iter()
            .any(|(path, branch)| path.ends_with("feature-x")
                && branch.as_deref() == Some("feature-x")),
        "git does not list the new worktree on its branch: {branches:?}"
    );

    let env_content = std::fs::read_to_string(wt_path.join(".env")).unwrap();
    assert!(env_content.contains("WORKTREE_NAME=\"feature-x\""));
    assert!(env_content.contains("WORKTREE_PATH="));
    assert!(env_content.contains("REPO_ROOT="));

    // switch --script prints a single line: the path of a sourceable file
    let stdout = repo.workstack_ok(&["switch", "feature-x", "--script"]);
    let script_path = std::path::PathBuf::from(stdout.trim());
    assert!(script_path.is_file(), "no script at {}", script_path.display());
    let script = std::fs::read_to_string(&script_path).unwrap();
    assert!(
        script.contains(&format!("cd '{}'", wt_path.display())),
        "script does not cd into the worktree:\n{script}"
    );
}

// Sourcing the activation script twice lands in the same cwd
#[cfg(unix)]
#[rstest]
fn test_activation_script_idempotent(repo: TestRepo) {
    repo.workstack_ok(&["create", "feature-x", "--no-post"]);
    let stdout = repo.workstack_ok(&["switch", "feature-x", "--script"]);
    let script_path = stdout.trim().to_string();

    let output = std::process::Command::new("sh")
        .args(["-c", &format!(". '{script_path}' && . '{script_path}' && pwd")])
        .output()
        .unwrap();
    assert!(output.status.success());
    let pwd = String::from_utf8_lossy(&output.stdout);
    let last_line = pwd.lines().last().unwrap();
    assert!(last_line.ends_with("feature-x"), "unexpected pwd: {pwd}");
}

// Reserved names are rejected, nothing is created
#[rstest]
#[case::root("root")]
#[case::root_upper("ROOT")]
#[case::main("main")]
#[case::master("Master")]
fn test_reserved_names_rejected(repo: TestRepo, #[case] name: &str) {
    let output = repo.workstack(&["create", name]);
    assert!(!output.status.success(), "create {name} unexpectedly succeeded");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("reserved") || stderr.contains("cannot be used"),
        "unhelpful rejection message: {stderr}"
    );
    assert!(!repo.workstacks_dir().join(name).exists());
}

#[rstest]
fn test_switch_main_redirects_to_root(repo: TestRepo) {
    let output = repo.workstack(&["switch", "main"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("workstack switch root"));
}

#[rstest]
fn test_create_rejects_existing_path(repo: TestRepo) {
    repo.workstack_ok(&["create", "feature-x", "--no-post"]);
    let output = repo.workstack(&["create", "feature-x", "--no-post"]);
    assert!(!output.status.success());
}

#[rstest]
fn test_create_from_branch(repo: TestRepo) {
    repo.git(&["branch", "existing-work"]);
    repo.workstack_ok(&["create", "--from-branch", "existing-work", "--no-post"]);

    let wt_path = repo.workstacks_dir().join("existing-work");
    assert_eq!(repo.branch_of(&wt_path).as_deref(), Some("existing-work"));
    // No second branch was invented
    assert_eq!(repo.branch_of(&repo.root).as_deref(), Some("main"));
}

#[rstest]
fn test_create_from_current_branch_moves_branch(repo: TestRepo) {
    repo.git(&["checkout", "-q", "-b", "topic"]);
    repo.commit_file("topic.txt", "topic\n", "topic work");

    repo.workstack_ok(&["create", "--from-current-branch", "--no-post"]);

    // The branch moved into the new worktree; the root fell back to main
    let wt_path = repo.workstacks_dir().join("topic");
    assert_eq!(repo.branch_of(&wt_path).as_deref(), Some("topic"));
    assert_eq!(repo.branch_of(&repo.root).as_deref(), Some("main"));
}

#[rstest]
fn test_create_from_current_branch_on_main_is_rejected(repo: TestRepo) {
    let output = repo.workstack(&["create", "somewhere", "--from-current-branch"]);
    assert!(!output.status.success());
}

// A plan file drives the worktree name
#[rstest]
fn test_create_from_plan_file(repo: TestRepo) {
    let plan = repo.root.join("auth-refactor-plan.md");
    std::fs::write(&plan, "# Auth refactor\n\nsteps\n").unwrap();

    repo.workstack_ok(&["create", "--plan", plan.to_str().unwrap(), "--no-post"]);

    let wt_path = repo.workstacks_dir().join("auth-refactor");
    assert!(wt_path.is_dir());
    assert!(wt_path.join(".PLAN.md").is_file(), "plan was not moved");
    assert!(!plan.exists(), "plan should have been moved, not copied");
}

#[rstest]
fn test_create_keep_plan_copies(repo: TestRepo) {
    let plan = repo.root.join("cache-plan.md");
    std::fs::write(&plan, "# Cache\n").unwrap();

    repo.workstack_ok(&["create", "--plan", plan.to_str().unwrap(), "--keep-plan", "--no-post"]);

    assert!(repo.workstacks_dir().join("cache").join(".PLAN.md").is_file());
    assert!(plan.exists(), "--keep-plan must leave the original in place");
}

// Move with swap
#[rstest]
fn test_move_swaps_branches(repo: TestRepo) {
    repo.workstack_ok(&["create", "wt-a", "--branch", "br-a", "--no-post"]);
    repo.workstack_ok(&["create", "wt-b", "--branch", "br-b", "--no-post"]);

    repo.workstack_ok(&["move", "--worktree", "wt-a", "wt-b", "--force"]);

    let wt_a = repo.workstacks_dir().join("wt-a");
    let wt_b = repo.workstacks_dir().join("wt-b");
    assert_eq!(repo.branch_of(&wt_a).as_deref(), Some("br-b"));
    assert_eq!(repo.branch_of(&wt_b).as_deref(), Some("br-a"));

    assert_unique_branches(&repo);
}

#[rstest]
fn test_move_to_new_target_creates_worktree(repo: TestRepo) {
    repo.workstack_ok(&["create", "wt-c", "--branch", "br-c", "--no-post"]);

    repo.workstack_ok(&["move", "--worktree", "wt-c", "wt-d", "--force"]);

    let wt_c = repo.workstacks_dir().join("wt-c");
    let wt_d = repo.workstacks_dir().join("wt-d");
    assert_eq!(repo.branch_of(&wt_d).as_deref(), Some("br-c"));
    // Source fell back to main; the root (which held main) was detached to
    // preserve the single-checkout invariant
    assert_eq!(repo.branch_of(&wt_c).as_deref(), Some("main"));
    assert_eq!(repo.branch_of(&repo.root), None);

    assert_unique_branches(&repo);
}

#[rstest]
fn test_move_rejects_same_source_and_target(repo: TestRepo) {
    repo.workstack_ok(&["create", "wt-a", "--branch", "br-a", "--no-post"]);
    let output = repo.workstack(&["move", "--worktree", "wt-a", "wt-a", "--force"]);
    assert!(!output.status.success());
}

#[rstest]
fn test_move_refuses_dirty_source_without_force(repo: TestRepo) {
    repo.workstack_ok(&["create", "wt-a", "--branch", "br-a", "--no-post"]);
    let wt_a = repo.workstacks_dir().join("wt-a");
    std::fs::write(wt_a.join("dirty.txt"), "uncommitted\n").unwrap();

    let output = repo.workstack(&["move", "--worktree", "wt-a", "wt-b"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Uncommitted changes"), "stderr: {stderr}");
}

// No branch is ever checked out in two worktrees
fn assert_unique_branches(repo: &TestRepo) {
    let mut seen = std::collections::HashSet::new();
    for (path, branch) in repo.checked_out_branches() {
        if let Some(branch) = branch {
            assert!(
                seen.insert(branch.clone()),
                "branch {branch} checked out twice (second at {})",
                path.display()
            );
        }
    }
}
