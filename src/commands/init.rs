//! `workstack init` - install or print the shell wrapper.

use anyhow::Context;
use clap::Args;
use color_print::cprintln;

use crate::config::GlobalConfig;
use crate::shell::Shell;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Shell to integrate with
    #[arg(value_enum)]
    pub shell: Shell,

    /// Print the wrapper function instead of installing it
    #[arg(long)]
    pub show: bool,
}

pub fn run(args: InitArgs) -> anyhow::Result<()> {
    const CMD: &str = "workstack";

    if args.show {
        print!("{}", args.shell.render_wrapper(CMD)?);
        return Ok(());
    }

    let config_path = args.shell.config_path()?;

    if args.shell.is_configured(CMD)? {
        println!("Shell integration already installed in {}", config_path.display());
        return Ok(());
    }

    let line = args.shell.config_line(CMD);
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config_path)
        .with_context(|| format!("Failed to open {}", config_path.display()))?;
    writeln!(file, "\n# workstack shell integration\n{line}")?;

    // Best effort: a missing global config just means setup completes later
    if GlobalConfig::set("shell_setup_complete", "true").is_err() {
        log::debug!("could not record shell_setup_complete (no global config yet)");
    }

    cprintln!("<green>✓ Shell integration installed in <bold>{}</></>", config_path.display());
    println!("Restart your shell (or source the file) to pick it up.");
    Ok(())
}
