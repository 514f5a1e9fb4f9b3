//! Argument parsing and command dispatch.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};

use crate::commands::config_cmd::ConfigCommand;
use crate::commands::create::CreateArgs;
use crate::commands::init::InitArgs;
use crate::commands::land::LandArgs;
use crate::commands::list::ListArgs;
use crate::commands::mv::MoveArgs;
use crate::commands::rebase::RebaseCommand;
use crate::commands::remove::RemoveArgs;
use crate::commands::status::StatusArgs;
use crate::commands::switch::SwitchArgs;

#[derive(Parser)]
#[command(name = "workstack")]
#[command(about = "Manage git worktrees in a central location", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a worktree and write its .env file
    Create(CreateArgs),

    /// Switch to a worktree and activate its environment
    Switch(SwitchArgs),

    /// List worktrees (alias: ls)
    List(ListArgs),

    #[command(hide = true)]
    Ls(ListArgs),

    /// Move branches between worktrees
    #[command(name = "move")]
    Move(MoveArgs),

    /// Remove a worktree (alias: rm)
    Remove(RemoveArgs),

    #[command(hide = true)]
    Rm(RemoveArgs),

    /// Safe rebasing using rebase stacks
    #[command(subcommand)]
    Rebase(RebaseCommand),

    /// Show status for the current worktree
    Status(StatusArgs),

    /// Inspect and edit global configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Install or print the shell wrapper
    Init(InitArgs),

    /// Land the current branch's PR (stack parent must be the default branch)
    Land(LandArgs),

    /// Generate a shell completion script
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },

    /// Shell wrapper entry point for switch (prints a script path)
    #[command(name = "__switch-eval", hide = true, disable_help_flag = true)]
    SwitchEval {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Shell wrapper entry point for create (prints a script path)
    #[command(name = "__create-eval", hide = true, disable_help_flag = true)]
    CreateEval {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    use crate::commands;

    match cli.command {
        Commands::Create(args) => commands::create::run(args),
        Commands::Switch(args) => commands::switch::run(args),
        Commands::List(args) | Commands::Ls(args) => commands::list::run(args),
        Commands::Move(args) => commands::mv::run(args),
        Commands::Remove(args) | Commands::Rm(args) => commands::remove::run(args),
        Commands::Rebase(command) => commands::rebase::run(command),
        Commands::Status(args) => commands::status::run(args),
        Commands::Config(command) => commands::config_cmd::run(command),
        Commands::Init(args) => commands::init::run(args),
        Commands::Land(args) => commands::land::run(args),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "workstack", &mut std::io::stdout());
            Ok(())
        }
        Commands::SwitchEval { args } => commands::eval::run_switch_eval(args),
        Commands::CreateEval { args } => commands::eval::run_create_eval(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_asserts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_aliases_parse() {
        assert!(Cli::try_parse_from(["workstack", "ls"]).is_ok());
        assert!(Cli::try_parse_from(["workstack", "rm", "feature", "--force"]).is_ok());
    }

    #[test]
    fn test_hidden_eval_takes_hyphen_args() {
        let cli = Cli::try_parse_from(["workstack", "__switch-eval", "--up"]).unwrap();
        match cli.command {
            Commands::SwitchEval { args } => assert_eq!(args, vec!["--up"]),
            _ => panic!("expected SwitchEval"),
        }
    }

    #[test]
    fn test_rebase_subcommands_parse() {
        for args in [
            vec!["workstack", "rebase", "preview", "feature", "--onto", "main"],
            vec!["workstack", "rebase", "status"],
            vec!["workstack", "rebase", "apply", "feature", "--force"],
            vec!["workstack", "rebase", "abort"],
        ] {
            assert!(Cli::try_parse_from(&args).is_ok(), "failed to parse {args:?}");
        }
    }

    #[test]
    fn test_create_rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["workstack", "create", "x", "--bogus"]).is_err());
    }
}
