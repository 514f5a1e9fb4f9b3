//! `workstack config` - inspect and edit the global configuration.

use anyhow::Context;
use clap::Subcommand;

use crate::config::{CONFIG_KEYS, GlobalConfig, config_path, get_value_at};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// List all configuration values
    List,
    /// Print one configuration value
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// Set one configuration value (other keys are preserved)
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
}

pub fn run(command: ConfigCommand) -> anyhow::Result<()> {
    match command {
        ConfigCommand::List => {
            let path = config_path()?;
            if !path.exists() {
                println!("No config file at {}", path.display());
                println!("Run 'workstack config set workstacks_root <path>' to create it.");
                return Ok(());
            }
            for (key, _) in CONFIG_KEYS {
                if let Some(value) = get_value_at(&path, key)? {
                    println!("{key} = {value}");
                }
            }
            Ok(())
        }
        ConfigCommand::Get { key } => {
            let value = get_value_at(&config_path()?, &key)?
                .with_context(|| format!("'{key}' is not set"))?;
            println!("{value}");
            Ok(())
        }
        ConfigCommand::Set { key, value } => {
            GlobalConfig::set(&key, &value)?;
            println!("{key} = {value}");
            Ok(())
        }
    }
}
