//! The activation-script protocol: hidden eval entry points and wrapper
//! generation.

mod common;

use common::{TestRepo, repo};
use rstest::rstest;

const SENTINEL: &str = "__WORKSTACK_PASSTHROUGH__";

#[rstest]
fn test_switch_eval_prints_script_path(repo: TestRepo) {
    repo.workstack_ok(&["create", "feature-x", "--no-post"]);

    let stdout = repo.workstack_ok(&["__switch-eval", "feature-x"]);
    let script_path = std::path::PathBuf::from(stdout.trim());
    assert!(script_path.is_file(), "expected a script path, got: {stdout}");
    let script = std::fs::read_to_string(script_path).unwrap();
    assert!(script.contains("cd '"));
}

#[rstest]
fn test_switch_eval_passthrough_on_help(repo: TestRepo) {
    for flag in ["--help", "-h", "--script"] {
        let stdout = repo.workstack_ok(&["__switch-eval", flag]);
        assert_eq!(stdout.trim(), SENTINEL, "flag {flag}");
    }
}

#[rstest]
fn test_switch_eval_passthrough_on_error(repo: TestRepo) {
    let output = repo.workstack(&["__switch-eval", "no-such-worktree"]);
    assert!(!output.status.success());
    // The wrapper must get the sentinel (not an error message) on stdout so
    // it re-invokes the regular command
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), SENTINEL);
}

#[rstest]
fn test_create_eval_passthrough_on_help(repo: TestRepo) {
    let stdout = repo.workstack_ok(&["__create-eval", "--help"]);
    assert_eq!(stdout.trim(), SENTINEL);
}

#[rstest]
fn test_create_eval_creates_and_prints_script(repo: TestRepo) {
    let stdout = repo.workstack_ok(&["__create-eval", "feature-y", "--no-post"]);
    let script_path = std::path::PathBuf::from(stdout.trim());
    assert!(script_path.is_file(), "expected a script path, got: {stdout}");
    assert!(repo.workstacks_dir().join("feature-y").is_dir());
}

#[rstest]
fn test_init_show_prints_wrapper(repo: TestRepo) {
    let stdout = repo.workstack_ok(&["init", "bash", "--show"]);
    assert!(stdout.contains("workstack() {"));
    assert!(stdout.contains(SENTINEL));

    let fish = repo.workstack_ok(&["init", "fish", "--show"]);
    assert!(fish.contains("function workstack"));
}

#[rstest]
fn test_init_installs_config_line(repo: TestRepo) {
    repo.workstack_ok(&["init", "bash"]);
    let bashrc = std::fs::read_to_string(repo.home.join(".bashrc")).unwrap();
    assert!(bashrc.contains("workstack init bash --show"), "{bashrc}");

    // shell_setup_complete was recorded
    let value = repo.workstack_ok(&["config", "get", "shell_setup_complete"]);
    assert_eq!(value.trim(), "true");

    // Idempotent: a second install doesn't duplicate the line
    repo.workstack_ok(&["init", "bash"]);
    let bashrc_again = std::fs::read_to_string(repo.home.join(".bashrc")).unwrap();
    assert_eq!(
        bashrc_again.matches("workstack init bash --show").count(),
        1
    );
}

#[rstest]
fn test_completion_generates_script(repo: TestRepo) {
    let stdout = repo.workstack_ok(&["completion", "bash"]);
    assert!(stdout.contains("workstack"));
}
