// Helpers are shared across integration test files; not every file uses
// every helper.
#![allow(dead_code)]

//! Test harness for workstack.
//!
//! `TestRepo` creates an isolated git repository in a temp directory,
//! together with a fake home directory carrying a global workstack config
//! and a workstacks root. Tests drive the real `workstack` binary through
//! [`TestRepo::workstack`], with `HOME` pointed at the fake home so neither
//! the user's git config nor their workstack config leaks in.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

pub struct TestRepo {
    tmp: TempDir,
    /// The repository root (the "root" worktree)
    pub root: PathBuf,
    /// Fake $HOME carrying .workstack/config.toml
    pub home: PathBuf,
    /// Root directory for managed worktrees
    pub workstacks_root: PathBuf,
}

impl TestRepo {
    /// A fresh repo named `repo` on branch `main` with one commit, and a
    /// global config with Graphite disabled.
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        let home = tmp.path().join("home");
        let workstacks_root = tmp.path().join("ws");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(home.join(".workstack")).unwrap();
        std::fs::create_dir_all(&workstacks_root).unwrap();

        let repo = Self {
            tmp,
            root,
            home,
            workstacks_root,
        };
        repo.write_global_config(&[("use_graphite", "false")]);

        repo.git(&["init", "-q"]);
        repo.commit_file("README.md", "hello\n", "initial commit");
        repo.git(&["branch", "-M", "main"]);
        repo
    }

    /// Write `~/.workstack/config.toml` with `workstacks_root` plus extras.
    pub fn write_global_config(&self, extras: &[(&str, &str)]) {
        let mut content = format!("workstacks_root = \"{}\"\n", self.workstacks_root.display());
        for (key, value) in extras {
            content.push_str(&format!("{key} = {value}\n"));
        }
        std::fs::write(self.home.join(".workstack/config.toml"), content).unwrap();
    }

    pub fn workstacks_dir(&self) -> PathBuf {
        self.workstacks_root.join("repo")
    }

    fn apply_env(&self, cmd: &mut Command) {
        cmd.env("HOME", &self.home)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .env("GIT_AUTHOR_DATE", "2026-01-02T03:04:05Z")
            .env("GIT_COMMITTER_DATE", "2026-01-02T03:04:05Z");
    }

    /// Run git in the repo root, asserting success.
    pub fn git(&self, args: &[&str]) -> String {
        self.git_in(&self.root, args)
    }

    /// Run git in an arbitrary directory, asserting success.
    pub fn git_in(&self, dir: &Path, args: &[&str]) -> String {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(dir);
        self.apply_env(&mut cmd);
        let output = cmd.output().expect("git must be installed");
        assert!(
            output.status.success(),
            "git {args:?} failed in {}: {}",
            dir.display(),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    /// Run git without asserting; returns the raw output.
    pub fn try_git_in(&self, dir: &Path, args: &[&str]) -> Output {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(dir);
        self.apply_env(&mut cmd);
        cmd.output().expect("git must be installed")
    }

    /// Commit a file in the repo root.
    pub fn commit_file(&self, name: &str, content: &str, message: &str) {
        self.commit_file_in(&self.root, name, content, message);
    }

    /// Commit a file in an arbitrary worktree.
    pub fn commit_file_in(&self, dir: &Path, name: &str, content: &str, message: &str) {
        std::fs::write(dir.join(name), content).unwrap();
        self.git_in(dir, &["add", name]);
        self.git_in(dir, &["commit", "-q", "-m", message]);
    }

    /// Run the workstack binary in the repo root.
    pub fn workstack(&self, args: &[&str]) -> Output {
        self.workstack_in(&self.root, args)
    }

    /// Run the workstack binary in an arbitrary directory.
    pub fn workstack_in(&self, dir: &Path, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_workstack"));
        cmd.args(args).current_dir(dir);
        self.apply_env(&mut cmd);
        cmd.output().expect("failed to spawn workstack binary")
    }

    /// Run workstack and assert success, returning stdout.
    pub fn workstack_ok(&self, args: &[&str]) -> String {
        let output = self.workstack(args);
        assert!(
            output.status.success(),
            "workstack {args:?} failed:\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    /// Branches currently checked out, from `git worktree list --porcelain`.
    pub fn checked_out_branches(&self) -> Vec<(PathBuf, Option<String>)> {
        let porcelain = self.git(&["worktree", "list", "--porcelain"]);
        let mut result = Vec::new();
        let mut path: Option<PathBuf> = None;
        let mut branch: Option<String> = None;
        for line in porcelain.lines() {
            if let Some(p) = line.strip_prefix("worktree ") {
                path = Some(PathBuf::from(p));
            } else if let Some(b) = line.strip_prefix("branch ") {
                branch = Some(b.trim_start_matches("refs/heads/").to_string());
            } else if line.is_empty()
                && let Some(p) = path.take()
            {
                result.push((p, branch.take()));
            }
        }
        if let Some(p) = path {
            result.push((p, branch));
        }
        result
    }

    /// The branch a worktree has checked out.
    pub fn branch_of(&self, dir: &Path) -> Option<String> {
        let output = self.try_git_in(dir, &["symbolic-ref", "--short", "-q", "HEAD"]);
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Tip SHA of a branch.
    pub fn head_of(&self, branch: &str) -> String {
        self.git(&["rev-parse", branch]).trim().to_string()
    }

    /// Write a Graphite cache describing a linear stack under `main`.
    ///
    /// `chain` is the list of non-trunk branches, bottom-up (e.g.
    /// `["b1", "b2"]` encodes main ← b1 ← b2).
    pub fn write_graphite_cache(&self, chain: &[&str]) {
        let git_dir = self.root.join(".git");
        let mut branches = Vec::new();

        let first_child = chain.first().map(|c| vec![c.to_string()]).unwrap_or_default();
        branches.push(serde_json::json!([
            "main",
            {"validationResult": "TRUNK", "children": first_child}
        ]));

        for (i, name) in chain.iter().enumerate() {
            let parent = if i == 0 { "main" } else { chain[i - 1] };
            let children: Vec<String> = chain
                .get(i + 1)
                .map(|c| vec![c.to_string()])
                .unwrap_or_default();
            branches.push(serde_json::json!([
                name,
                {"parentBranchName": parent, "children": children}
            ]));
        }

        let cache = serde_json::json!({ "branches": branches });
        std::fs::write(
            git_dir.join(".graphite_cache_persist"),
            serde_json::to_string_pretty(&cache).unwrap(),
        )
        .unwrap();
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// Fresh-repo fixture for rstest.
#[rstest::fixture]
pub fn repo() -> TestRepo {
    TestRepo::new()
}
