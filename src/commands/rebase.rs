//! `workstack rebase` - safe rebasing through rebase stacks.

use std::path::Path;

use anyhow::bail;
use clap::Subcommand;
use color_print::cprintln;

use crate::config::GlobalConfig;
use crate::git::{GitError, Repository};
use crate::rebase_stack::{RebaseStacks, StackInfo, StackState, detect_test_command, run_tests};
use crate::styling::confirm;

#[derive(Debug, Subcommand)]
pub enum RebaseCommand {
    /// Preview a rebase in an isolated stack without touching the branch
    Preview {
        branch: Option<String>,
        /// Target branch to rebase onto (default: the default branch)
        #[arg(long)]
        onto: Option<String>,
    },
    /// Show status of rebase stacks
    Status { branch: Option<String> },
    /// Resolve conflicts in a rebase stack interactively
    Resolve {
        branch: Option<String>,
        /// Editor to use for manual resolution (default: $EDITOR)
        #[arg(long)]
        editor: Option<String>,
    },
    /// Run tests in a rebase stack
    Test {
        branch: Option<String>,
        /// Custom test command to run
        #[arg(long)]
        command: Option<String>,
    },
    /// Apply a completed rebase stack to the actual branch
    Apply {
        branch: Option<String>,
        /// Skip safety checks
        #[arg(long)]
        force: bool,
    },
    /// Compare the branch with its rebase stack
    Compare { branch: Option<String> },
    /// Abort and clean up a rebase stack
    Abort { branch: Option<String> },
}

struct RebaseContext {
    git: Repository,
    location: String,
}

impl RebaseContext {
    fn stacks(&self) -> RebaseStacks<'_> {
        RebaseStacks::new(&self.git, &self.location)
    }
}

fn setup(branch: Option<String>) -> anyhow::Result<(RebaseContext, String)> {
    let cwd = std::env::current_dir()?;
    let config = GlobalConfig::load()?;
    let git = Repository::discover(&cwd)?;

    let branch = match branch {
        Some(branch) => branch,
        None => git.worktree_at(&cwd).branch()?.ok_or(GitError::DetachedHead {
            action: Some("rebase (specify a branch name)".to_string()),
        })?,
    };

    Ok((
        RebaseContext {
            git,
            location: config.rebase_stack_location,
        },
        branch,
    ))
}

pub fn run(command: RebaseCommand) -> anyhow::Result<()> {
    match command {
        RebaseCommand::Preview { branch, onto } => preview(branch, onto),
        RebaseCommand::Status { branch } => status(branch),
        RebaseCommand::Resolve { branch, editor } => resolve(branch, editor),
        RebaseCommand::Test { branch, command } => test(branch, command),
        RebaseCommand::Apply { branch, force } => apply(branch, force),
        RebaseCommand::Compare { branch } => compare(branch),
        RebaseCommand::Abort { branch } => abort(branch),
    }
}

fn preview(branch: Option<String>, onto: Option<String>) -> anyhow::Result<()> {
    let (ctx, branch) = setup(branch)?;
    let onto = match onto {
        Some(onto) => onto,
        None => ctx.git.default_branch()?,
    };

    println!("Creating rebase stack for {branch}...");
    let stacks = ctx.stacks();
    if stacks.stack_exists(&branch) {
        eprintln!(
            "{}",
            crate::styling::warning_message(format!(
                "Rebase stack already exists for {branch}. Recreating..."
            ))
        );
    }

    let stack_path = stacks.create_stack(&branch, &onto)?;
    println!("Rebase stack created at: {}", stack_path.display());

    let original = ctx
        .git
        .branch_head(&branch)
        .unwrap_or_default();
    let commits_to_rebase = ctx
        .git
        .merge_base(&onto, &original)
        .and_then(|base| ctx.git.count_commits(&base, &original).ok());
    let Some(commits_to_rebase) = commits_to_rebase else {
        println!("Error: No common ancestor between {branch} and {onto}");
        stacks.cleanup_stack(&branch);
        bail!("No common ancestor between {branch} and {onto}");
    };

    println!("\nPreviewing rebase of {branch} onto {onto}...");
    println!("Commits to rebase: {commits_to_rebase}");

    let (success, conflicts) = ctx.git.worktree_at(&stack_path).start_rebase(&onto)?;

    println!("\n{}", "=".repeat(50));
    println!("REBASE STACK PREVIEW");
    println!("{}\n", "=".repeat(50));

    if success {
        cprintln!("<green><bold>✓ Rebase completed cleanly</></>");
        println!("  All {commits_to_rebase} commits applied successfully");
        println!("\nNext steps:");
        println!("  • workstack rebase apply {branch}  (apply to actual branch)");
        stacks.update_state(&stack_path, StackState::Resolved)?;
    } else if !conflicts.is_empty() {
        cprintln!("<yellow><bold>⚠ Conflicts detected: {} file(s)</></>", conflicts.len());
        println!("\nConflicted files:");
        for file in &conflicts {
            println!("  • {file}");
        }
        println!("\nNext steps:");
        println!("  • workstack rebase resolve {branch}  (resolve conflicts)");
        println!("  • workstack rebase abort {branch}    (discard stack)");
        stacks.update_state(&stack_path, StackState::Conflicted)?;
    } else {
        cprintln!("<red><bold>✗ Rebase failed</></>");
        println!("\nCheck the rebase stack for details:");
        println!("  cd {}", stack_path.display());
        stacks.update_state(&stack_path, StackState::Failed)?;
    }

    Ok(())
}

fn status(branch: Option<String>) -> anyhow::Result<()> {
    let (ctx, _) = setup(branch.clone())?;
    let stacks = ctx.stacks();

    if let Some(branch) = branch {
        if !stacks.stack_exists(&branch) {
            println!("No rebase stack for {branch}");
            return Ok(());
        }
        let stack_path = stacks.stack_path(&branch);
        if let Some(info) = stacks.get_stack_info(&stack_path)? {
            display_stack_info(&info);
        }
        return Ok(());
    }

    let all = stacks.list_stacks()?;
    if all.is_empty() {
        println!("No active rebase stacks");
        return Ok(());
    }
    println!("Active rebase stacks: {}\n", all.len());
    for info in &all {
        display_stack_info(info);
        println!();
    }
    Ok(())
}

fn resolve(branch: Option<String>, editor: Option<String>) -> anyhow::Result<()> {
    let (ctx, branch) = setup(branch)?;
    let stacks = ctx.stacks();

    if !stacks.stack_exists(&branch) {
        bail!("No rebase stack for {branch}");
    }
    let stack_path = stacks.stack_path(&branch);
    let stack_wt = ctx.git.worktree_at(&stack_path);

    let conflicts = stack_wt.conflicted_files()?;
    if conflicts.is_empty() {
        println!("No conflicts to resolve for {branch}");
        return Ok(());
    }

    println!("Resolving conflicts for {branch}...");
    println!("Conflicted files: {}\n", conflicts.len());

    let editor = editor
        .or_else(|| std::env::var("EDITOR").ok())
        .unwrap_or_else(|| "vi".to_string());

    for file in &conflicts {
        println!("Opening {file}...");
        let status = std::process::Command::new(&editor)
            .arg(file)
            .current_dir(&stack_path)
            .status()?;
        if !status.success() {
            bail!("Editor exited nonzero for {file}");
        }
        stack_wt.stage(file)?;
    }

    println!("\nContinuing rebase...");
    let (success, remaining) = stack_wt.continue_rebase()?;

    if success {
        cprintln!("<green><bold>✓ Rebase completed!</></>");
        stacks.update_state(&stack_path, StackState::Resolved)?;
        println!("\nNext step:");
        println!("  • workstack rebase apply {branch}");
    } else if !remaining.is_empty() {
        cprintln!("<yellow>⚠ More conflicts remain: {}</>", remaining.len());
        println!("Run this command again to continue resolving");
        stacks.update_state(&stack_path, StackState::Conflicted)?;
    } else {
        cprintln!("<red>✗ Rebase failed</>");
        stacks.update_state(&stack_path, StackState::Failed)?;
    }

    Ok(())
}

fn test(branch: Option<String>, command: Option<String>) -> anyhow::Result<()> {
    let (ctx, branch) = setup(branch)?;
    let stacks = ctx.stacks();

    if !stacks.stack_exists(&branch) {
        bail!("No rebase stack for {branch}");
    }
    let stack_path = stacks.stack_path(&branch);

    if let Some(info) = stacks.get_stack_info(&stack_path)?
        && info.state == StackState::Conflicted
    {
        bail!("Resolve conflicts before running tests");
    }

    let test_command = match command {
        Some(cmd) => cmd,
        None => {
            let Some(detected) = detect_test_command(&stack_path) else {
                bail!("No test command detected. Specify with --command");
            };
            println!("Detected test command: {detected}");
            detected
        }
    };

    println!("\nRunning tests in rebase stack for {branch}...");
    println!("Command: {test_command}\n");

    let result = run_tests(&stack_path, &test_command)?;

    if result.success {
        cprintln!("<green><bold>✓ Tests passed!</></>");
        println!("Duration: {:.1}s", result.duration.as_secs_f64());
        stacks.update_state(&stack_path, StackState::Tested)?;
        println!("\nNext step:");
        println!("  • workstack rebase apply {branch}");
        Ok(())
    } else {
        cprintln!("<red><bold>✗ Tests failed</></>");
        println!("Exit code: {}", result.exit_code);
        println!("Duration: {:.1}s", result.duration.as_secs_f64());
        stacks.update_state(&stack_path, StackState::Failed)?;
        if !result.stdout.is_empty() {
            println!("\n--- stdout ---");
            println!("{}", result.stdout);
        }
        if !result.stderr.is_empty() {
            println!("\n--- stderr ---");
            println!("{}", result.stderr);
        }
        bail!("Tests failed in rebase stack for {branch}");
    }
}

fn apply(branch: Option<String>, force: bool) -> anyhow::Result<()> {
    let (ctx, branch) = setup(branch)?;
    let stacks = ctx.stacks();

    if !stacks.stack_exists(&branch) {
        bail!("No rebase stack to apply for {branch}");
    }
    let stack_path = stacks.stack_path(&branch);

    if !validate_before_apply(&ctx, &stacks, &branch, &stack_path, force)? {
        bail!("Pre-apply validation failed");
    }

    println!("Applying rebase stack to {branch}...");

    // Read the stack tip BEFORE any state changes: this is the commit the
    // real branch ends up on
    let stack_commit = ctx.git.worktree_at(&stack_path).head_sha()?;

    match ctx.git.is_branch_checked_out(&branch)? {
        Some(branch_worktree) if branch_worktree != stack_path => {
            ctx.git.worktree_at(&branch_worktree).reset_hard(&stack_commit)?;
        }
        _ => {
            ctx.git.force_branch(&branch, &stack_commit)?;
        }
    }

    stacks.update_state(&stack_path, StackState::Applied)?;
    stacks.cleanup_stack(&branch);

    cprintln!("<green><bold>✓ Rebase applied successfully!</></>");
    println!("{branch} has been rebased successfully");
    Ok(())
}

fn compare(branch: Option<String>) -> anyhow::Result<()> {
    let (ctx, branch) = setup(branch)?;
    let stacks = ctx.stacks();

    if !stacks.stack_exists(&branch) {
        bail!("No rebase stack for {branch}");
    }
    let stack_path = stacks.stack_path(&branch);

    let branch_commit = ctx
        .git
        .branch_head(&branch)
        .ok_or_else(|| anyhow::anyhow!("Branch '{branch}' does not exist"))?;
    let stack_commit = ctx.git.worktree_at(&stack_path).head_sha()?;

    println!("Comparing {branch} with rebase stack:\n");
    println!("Current:  {}", &branch_commit[..8.min(branch_commit.len())]);
    println!("Rebased:  {}\n", &stack_commit[..8.min(stack_commit.len())]);

    let diff = ctx.git.run_command(&["diff", &branch_commit, &stack_commit])?;
    print!("{diff}");
    Ok(())
}

fn abort(branch: Option<String>) -> anyhow::Result<()> {
    let (ctx, branch) = setup(branch)?;
    let stacks = ctx.stacks();

    if !stacks.stack_exists(&branch) {
        println!("No rebase stack to abort for {branch}");
        return Ok(());
    }

    println!("Aborting rebase stack for {branch}...");
    stacks.cleanup_stack(&branch);
    println!("Rebase stack cleaned up successfully");
    Ok(())
}

fn display_stack_info(info: &StackInfo) {
    let state_text = match info.state {
        StackState::Created => color_print::cformat!("<blue>{}</>", info.state),
        StackState::InProgress => color_print::cformat!("<yellow>{}</>", info.state),
        StackState::Conflicted | StackState::Failed => {
            color_print::cformat!("<red>{}</>", info.state)
        }
        StackState::Resolved | StackState::Tested | StackState::Applied => {
            color_print::cformat!("<green>{}</>", info.state)
        }
    };

    cprintln!("<cyan><bold>{}</></> - {}", info.branch_name, state_text);
    println!("  Target: {}", info.target_branch);
    println!("  Created: {}", info.created_at);
    if info.commits_to_rebase > 0 {
        println!(
            "  Commits: {} to rebase, {} applied",
            info.commits_to_rebase, info.commits_applied
        );
    }
    if !info.conflicts.is_empty() {
        println!("  Conflicts: {} file(s)", info.conflicts.len());
    }
}

/// Safety checks before `apply`. With `force`, everything passes.
fn validate_before_apply(
    ctx: &RebaseContext,
    stacks: &RebaseStacks<'_>,
    branch: &str,
    stack_path: &Path,
    force: bool,
) -> anyhow::Result<bool> {
    if force {
        return Ok(true);
    }

    println!("Running validation checks...");
    let mut checks_passed = true;

    let stack_wt = ctx.git.worktree_at(stack_path);
    let rebase_status = stack_wt.rebase_status()?;
    if rebase_status.in_progress {
        eprintln!("  ✗ Rebase still in progress");
        checks_passed = false;
    }
    if !rebase_status.conflicts.is_empty() {
        eprintln!("  ✗ Unresolved conflicts");
        checks_passed = false;
    }
    if stack_wt.has_tracked_changes()? {
        eprintln!("  ✗ Uncommitted changes in stack");
        checks_passed = false;
    }

    // The real branch's worktree (if any) must be clean too: apply will
    // hard-reset it
    if let Some(branch_worktree) = ctx.git.is_branch_checked_out(branch)?
        && branch_worktree != stack_path
        && ctx.git.worktree_at(&branch_worktree).has_tracked_changes()?
    {
        eprintln!("  ✗ Target branch {branch} has uncommitted changes");
        checks_passed = false;
    }

    if let Some(info) = stacks.get_stack_info(stack_path)?
        && info.state == StackState::Failed
    {
        eprintln!("  ⚠ Tests failed in stack");
        if !confirm("Apply anyway?") {
            checks_passed = false;
        }
    }

    if checks_passed {
        println!("  ✓ All checks passed\n");
    }
    Ok(checks_passed)
}
