//! Git error types and formatting

use std::path::PathBuf;

#[derive(Debug)]
pub enum GitError {
    /// Generic error with a message
    CommandFailed(String),
    /// The starting directory is not inside a git repository
    NotAGitRepository { path: PathBuf },
    /// Repository is in detached HEAD state
    DetachedHead { action: Option<String> },
    /// Branch is already checked out in another worktree
    BranchCheckedOut { branch: String, worktree: PathBuf },
    /// Neither `main` nor `master` exists
    NoDefaultBranch,
    /// Worktree path already exists on filesystem
    WorktreePathExists { path: PathBuf },
    /// Working tree has uncommitted changes
    UncommittedChanges { worktree: String },
    /// Child process exited with non-zero code (preserves exit code for signals)
    ChildProcessExited { code: i32, message: String },
    /// Deleting a branch failed
    BranchDeletionFailed { branch: String, error: String },
}

impl GitError {
    /// Create a formatted user-facing error message with emoji and styling.
    ///
    /// Use this for application errors (not raw git output).
    /// For raw git stderr, use `CommandFailed` directly.
    pub fn message(msg: impl Into<String>) -> Self {
        GitError::CommandFailed(crate::styling::error_message(msg.into()))
    }
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use color_print::cformat;

        use crate::styling::{ERROR_EMOJI, HINT_EMOJI};

        match self {
            // Raw passthrough, no formatting. Specific variants should be
            // used for failures that need styled output.
            GitError::CommandFailed(msg) => write!(f, "{}", msg),

            GitError::NotAGitRepository { path } => {
                write!(
                    f,
                    "{}",
                    cformat!(
                        "{ERROR_EMOJI} <red>Not in a git repository: <bold>{}</></>",
                        path.display()
                    )
                )
            }

            GitError::DetachedHead { action } => {
                let action = action.as_deref().unwrap_or("this operation");
                write!(
                    f,
                    "{}",
                    cformat!(
                        "{ERROR_EMOJI} <red>Not on a branch (detached HEAD)</>\n\n{HINT_EMOJI} <dim>Check out a branch before running {action}</>"
                    )
                )
            }

            GitError::BranchCheckedOut { branch, worktree } => {
                write!(
                    f,
                    "{}",
                    cformat!(
                        "{ERROR_EMOJI} <red>Branch <bold>{branch}</> is already checked out at <bold>{}</></>\n\n{HINT_EMOJI} <dim>Git doesn't allow the same branch in multiple worktrees</>",
                        worktree.display()
                    )
                )
            }

            GitError::NoDefaultBranch => {
                write!(
                    f,
                    "{}",
                    cformat!("{ERROR_EMOJI} <red>Could not find a <bold>main</> or <bold>master</> branch</>")
                )
            }

            GitError::WorktreePathExists { path } => {
                write!(
                    f,
                    "{}",
                    cformat!(
                        "{ERROR_EMOJI} <red>Worktree path already exists: <bold>{}</></>\n\n{HINT_EMOJI} <dim>Remove the directory or pick a different name</>",
                        path.display()
                    )
                )
            }

            GitError::UncommittedChanges { worktree } => {
                write!(
                    f,
                    "{}",
                    cformat!(
                        "{ERROR_EMOJI} <red>Uncommitted changes in worktree <bold>{worktree}</></>\n\n{HINT_EMOJI} <dim>Commit, stash, or use --force to override</>"
                    )
                )
            }

            // Display the message; main.rs uses the embedded exit code
            GitError::ChildProcessExited { code: _, message } => {
                write!(f, "{}", crate::styling::error_message(message))
            }

            GitError::BranchDeletionFailed { branch, error } => {
                write!(
                    f,
                    "{}",
                    cformat!("{ERROR_EMOJI} <red>Failed to delete branch <bold>{branch}</>: {error}</>")
                )
            }
        }
    }
}

impl std::error::Error for GitError {}
