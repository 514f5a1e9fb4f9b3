//! Git worktree management in a central location.
//!
//! Workstack keeps one directory of worktrees per repository under a
//! configured root, integrates optionally with Graphite for stacked-branch
//! workflows and with GitHub for PR state, and cooperates with a shell
//! wrapper to activate worktrees (cd + venv + `.env`).
//!
//! The library API is not stable; it exists so the integration tests can
//! exercise the same code paths the `workstack` binary uses.

pub mod activation;
pub mod cli;
pub mod commands;
pub mod config;
pub mod git;
pub mod github;
pub mod graphite;
pub mod naming;
pub mod plan;
pub mod rebase_stack;
pub mod shell;
pub mod shell_exec;
pub mod stack;
pub mod status;
pub mod styling;
pub mod sync;
pub mod workspace;
