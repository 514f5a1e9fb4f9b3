//! `workstack create` - create a worktree and write its `.env`.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Args;
use color_print::cprintln;

use crate::activation::{render_cd_script, write_script_to_temp};
use crate::config::{GlobalConfig, ProjectConfig, render_env_content};
use crate::git::{GitError, Repository};
use crate::naming::{
    default_branch_for_worktree, sanitize_worktree_name, strip_plan_from_filename,
};
use crate::plan::PLAN_FILENAME;
use crate::workspace::{discover_repo_context, ensure_workstacks_dir, is_reserved_name, worktree_path_for};

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Worktree name (defaults from --plan / --from-branch / --from-current-branch)
    #[arg(value_name = "NAME")]
    pub name: Option<String>,

    /// Branch to create and check out in the worktree. Defaults to the
    /// sanitized NAME.
    #[arg(long)]
    pub branch: Option<String>,

    /// Git ref to base the worktree on (e.g. HEAD, origin/main)
    #[arg(long, value_name = "REF")]
    pub r#ref: Option<String>,

    /// Skip post-create commands from config.toml
    #[arg(long)]
    pub no_post: bool,

    /// Plan markdown file; the worktree name is derived from the filename
    /// and the file moves to .PLAN.md in the worktree
    #[arg(long = "plan", value_name = "FILE")]
    pub plan_file: Option<PathBuf>,

    /// Copy the plan file instead of moving it (requires --plan)
    #[arg(long)]
    pub keep_plan: bool,

    /// Move the current branch into the new worktree, then switch this
    /// worktree to --ref (defaults to main/master)
    #[arg(long)]
    pub from_current_branch: bool,

    /// Create the worktree holding an existing branch
    #[arg(long, value_name = "BRANCH")]
    pub from_branch: Option<String>,

    /// Output a shell script path instead of messages (shell integration)
    #[arg(long, hide = true)]
    pub script: bool,
}

pub fn run(args: CreateArgs) -> anyhow::Result<()> {
    let flags_set = [
        args.from_current_branch,
        args.from_branch.is_some(),
        args.plan_file.is_some(),
    ]
    .iter()
    .filter(|f| **f)
    .count();
    if flags_set > 1 {
        bail!("Cannot use multiple of: --from-current-branch, --from-branch, --plan");
    }
    if args.keep_plan && args.plan_file.is_none() {
        bail!("--keep-plan requires --plan");
    }

    let cwd = std::env::current_dir()?;
    let config = GlobalConfig::load()?;
    let repo = discover_repo_context(&cwd, &config)?;
    let git = Repository::discover(&cwd)?;

    let mut name = args.name;
    let mut branch = args.branch;

    if args.from_current_branch {
        if branch.is_some() {
            bail!("Cannot specify --branch with --from-current-branch (uses current branch)");
        }
        let current_branch = git.worktree_at(&cwd).branch()?.ok_or(GitError::DetachedHead {
            action: Some("create --from-current-branch".to_string()),
        })?;
        if name.is_none() {
            name = Some(sanitize_worktree_name(&current_branch));
        }
        branch = Some(current_branch);
    } else if let Some(ref from_branch) = args.from_branch {
        if branch.is_some() {
            bail!("Cannot specify --branch with --from-branch (uses the specified branch)");
        }
        if name.is_none() {
            name = Some(sanitize_worktree_name(from_branch));
        }
        branch = Some(from_branch.clone());
    } else if let Some(ref plan_file) = args.plan_file {
        if name.is_some() {
            bail!("Cannot specify both NAME and --plan. Use one or the other.");
        }
        let stem = plan_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .with_context(|| format!("Cannot derive a name from {}", plan_file.display()))?;
        name = Some(sanitize_worktree_name(&strip_plan_from_filename(&stem)));
    } else if name.is_none() {
        bail!("Must provide NAME or --plan or --from-branch or --from-current-branch.");
    }

    let name = name.expect("name derived above");

    if name.eq_ignore_ascii_case("root") {
        bail!("\"root\" is a reserved name and cannot be used for a worktree.");
    }
    if is_reserved_name(&name) {
        bail!(
            "\"{name}\" cannot be used as a worktree name.\nTo switch to the {name} branch in the root repository, use:\n  workstack switch root"
        );
    }

    let workstacks_dir = ensure_workstacks_dir(&repo)?;
    let project_cfg = ProjectConfig::load(&workstacks_dir, &repo.root)?;
    let wt_path = worktree_path_for(&workstacks_dir, &name);

    if wt_path.exists() {
        return Err(GitError::WorktreePathExists { path: wt_path }.into());
    }

    if args.from_current_branch {
        let branch = branch.as_deref().expect("set above");
        let to_branch = match args.r#ref {
            Some(ref r) => r.clone(),
            None => git.default_branch()?,
        };
        if branch == to_branch {
            bail!(
                "Cannot use --from-current-branch when on '{branch}'.\nThe current branch cannot be moved to a worktree and then checked out again.\nCreate a new branch instead: workstack create {name}"
            );
        }
        // Free the current branch before the new worktree claims it
        git.worktree_at(&cwd).checkout_branch(&to_branch)?;
        git.add_worktree(&wt_path, Some(branch), None, false)?;
    } else if args.from_branch.is_some() {
        git.add_worktree(&wt_path, branch.as_deref(), None, false)?;
    } else {
        let branch = branch.unwrap_or_else(|| default_branch_for_worktree(&name));
        if config.use_graphite {
            create_graphite_branch_worktree(&git, &cwd, &wt_path, &branch)?;
        } else {
            git.add_worktree(&wt_path, Some(&branch), args.r#ref.as_deref(), true)?;
        }
        return finish(
            &args.plan_file,
            args.keep_plan,
            args.no_post,
            args.script,
            &project_cfg,
            &wt_path,
            &repo.root,
            &name,
            &branch,
        );
    }

    let branch = branch.expect("set above");
    finish(
        &args.plan_file,
        args.keep_plan,
        args.no_post,
        args.script,
        &project_cfg,
        &wt_path,
        &repo.root,
        &name,
        &branch,
    )
}

/// `gt create` makes the branch at the current HEAD, so the sequence is:
/// create the gt-tracked branch, put the original branch back, then attach
/// the new branch to the new worktree.
fn create_graphite_branch_worktree(
    git: &Repository,
    cwd: &Path,
    wt_path: &Path,
    branch: &str,
) -> anyhow::Result<()> {
    let wt = git.worktree_at(cwd);
    let original_branch = wt.branch()?.ok_or(GitError::DetachedHead {
        action: Some("create (with Graphite)".to_string()),
    })?;

    // `gt create --no-interactive` tries to commit staged files and fails
    // without a commit message
    if wt.has_staged_changes()? {
        bail!(
            "Staged changes detected. Graphite cannot create a branch while staged changes are present.\nCommit, unstage, or stash them - or disable Graphite:\n  workstack config set use_graphite false"
        );
    }

    crate::graphite::create_branch(cwd, branch)?;
    wt.checkout_branch(&original_branch)?;
    git.add_worktree(wt_path, Some(branch), None, false)
}

#[allow(clippy::too_many_arguments)]
fn finish(
    plan_file: &Option<PathBuf>,
    keep_plan: bool,
    no_post: bool,
    script: bool,
    project_cfg: &ProjectConfig,
    wt_path: &Path,
    repo_root: &Path,
    name: &str,
    branch: &str,
) -> anyhow::Result<()> {
    if wt_path.exists() {
        let env_content = render_env_content(project_cfg, wt_path, repo_root, name);
        std::fs::write(wt_path.join(".env"), env_content)
            .with_context(|| format!("Failed to write .env in {}", wt_path.display()))?;
    }

    if let Some(plan_file) = plan_file {
        let plan_dest = wt_path.join(PLAN_FILENAME);
        if keep_plan {
            std::fs::copy(plan_file, &plan_dest)
                .with_context(|| format!("Failed to copy plan to {}", plan_dest.display()))?;
            if !script {
                println!("Copied plan to {}", plan_dest.display());
            }
        } else {
            move_file(plan_file, &plan_dest)
                .with_context(|| format!("Failed to move plan to {}", plan_dest.display()))?;
            if !script {
                println!("Moved plan to {}", plan_dest.display());
            }
        }
    }

    if !no_post && !project_cfg.post_create.commands.is_empty() {
        println!("Running post-create commands...");
        run_commands_in_worktree(
            &project_cfg.post_create.commands,
            wt_path,
            project_cfg.post_create.shell.as_deref(),
        )?;
    }

    if script {
        let content = render_cd_script(wt_path, "cd to new worktree", "✓ Switched to new worktree.");
        let script_path = write_script_to_temp(&content, "create")?;
        print!("{}", script_path.display());
        use std::io::Write;
        std::io::stdout().flush()?;
    } else {
        cprintln!(
            "Created workstack at <bold>{}</> checked out at branch <bold>{branch}</>",
            wt_path.display()
        );
        println!("\nworkstack switch {name}");
    }

    Ok(())
}

/// `rename` fails across filesystems (plan files often live outside the
/// workstacks root), so fall back to copy + remove.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

/// Run commands serially in the worktree. With a configured shell, each runs
/// under `<shell> -lc`; otherwise commands are tokenized and run directly.
/// The first nonzero exit aborts the sequence.
fn run_commands_in_worktree(
    commands: &[String],
    worktree_path: &Path,
    shell: Option<&str>,
) -> anyhow::Result<()> {
    for cmd in commands {
        log::debug!("$ {} [post-create]", cmd);
        let status = if let Some(shell) = shell {
            std::process::Command::new(shell)
                .args(["-lc", cmd])
                .current_dir(worktree_path)
                .status()
        } else {
            let tokens = shlex::split(cmd)
                .with_context(|| format!("Cannot tokenize post-create command: {cmd}"))?;
            let Some((program, rest)) = tokens.split_first() else {
                continue;
            };
            std::process::Command::new(program)
                .args(rest)
                .current_dir(worktree_path)
                .status()
        }
        .with_context(|| format!("Failed to run post-create command: {cmd}"))?;

        if !status.success() {
            return Err(GitError::ChildProcessExited {
                code: status.code().unwrap_or(1),
                message: format!("Post-create command failed: {cmd}"),
            }
            .into());
        }
    }
    Ok(())
}
