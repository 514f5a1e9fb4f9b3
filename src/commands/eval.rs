//! Hidden entry points for the shell wrapper.
//!
//! The wrapper function calls `workstack __switch-eval ...` (or
//! `__create-eval`) and sources whatever path lands on stdout. Anything that
//! is not a sourceable script - help requests, an explicit `--script`, any
//! error - is signalled with the passthrough sentinel so the wrapper
//! re-invokes the regular command and the user sees normal output.

use clap::Parser;

use crate::activation::PASSTHROUGH_SENTINEL;

use super::create::CreateArgs;
use super::switch::SwitchArgs;

#[derive(Parser)]
struct SwitchEvalCli {
    #[command(flatten)]
    args: SwitchArgs,
}

#[derive(Parser)]
struct CreateEvalCli {
    #[command(flatten)]
    args: CreateArgs,
}

fn wants_passthrough(args: &[String]) -> bool {
    args.iter().any(|a| a == "-h" || a == "--help" || a == "--script")
}

/// `workstack __switch-eval ARGS...`
pub fn run_switch_eval(raw_args: Vec<String>) -> anyhow::Result<()> {
    if wants_passthrough(&raw_args) {
        println!("{PASSTHROUGH_SENTINEL}");
        return Ok(());
    }

    let mut argv = vec!["workstack-switch".to_string()];
    argv.extend(raw_args);
    argv.push("--script".to_string());

    let parsed = match SwitchEvalCli::try_parse_from(&argv) {
        Ok(parsed) => parsed,
        Err(_) => {
            println!("{PASSTHROUGH_SENTINEL}");
            std::process::exit(1);
        }
    };

    match super::switch::run(parsed.args) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::debug!("__switch-eval failed, passing through: {e}");
            println!("{PASSTHROUGH_SENTINEL}");
            std::process::exit(1);
        }
    }
}

/// `workstack __create-eval ARGS...`
pub fn run_create_eval(raw_args: Vec<String>) -> anyhow::Result<()> {
    if wants_passthrough(&raw_args) {
        println!("{PASSTHROUGH_SENTINEL}");
        return Ok(());
    }

    let mut argv = vec!["workstack-create".to_string()];
    argv.extend(raw_args);
    argv.push("--script".to_string());

    let parsed = match CreateEvalCli::try_parse_from(&argv) {
        Ok(parsed) => parsed,
        Err(_) => {
            println!("{PASSTHROUGH_SENTINEL}");
            std::process::exit(1);
        }
    };

    match super::create::run(parsed.args) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::debug!("__create-eval failed, passing through: {e}");
            println!("{PASSTHROUGH_SENTINEL}");
            std::process::exit(1);
        }
    }
}
