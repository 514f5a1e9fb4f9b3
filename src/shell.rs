//! Shell integration for workstack.
//!
//! The wrapper function (installed by `workstack init`) is what lets
//! `workstack switch` change the user's shell directory: the function calls
//! the hidden `__switch-eval` entry point, which prints an activation script
//! path, and sources it. See [`crate::activation`] for the script side of
//! the protocol.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::Context;
use askama::Template;

use crate::activation::PASSTHROUGH_SENTINEL;

/// Supported shells
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

/// Bash wrapper template
#[derive(Template)]
#[template(path = "bash.sh", escape = "none")]
struct BashTemplate<'a> {
    cmd: &'a str,
    sentinel: &'a str,
}

/// Zsh wrapper template
#[derive(Template)]
#[template(path = "zsh.zsh", escape = "none")]
struct ZshTemplate<'a> {
    cmd: &'a str,
    sentinel: &'a str,
}

/// Fish wrapper template
#[derive(Template)]
#[template(path = "fish.fish", escape = "none")]
struct FishTemplate<'a> {
    cmd: &'a str,
    sentinel: &'a str,
}

impl Shell {
    /// Render the wrapper function for this shell.
    pub fn render_wrapper(&self, cmd: &str) -> anyhow::Result<String> {
        let rendered = match self {
            Shell::Bash => BashTemplate {
                cmd,
                sentinel: PASSTHROUGH_SENTINEL,
            }
            .render(),
            Shell::Zsh => ZshTemplate {
                cmd,
                sentinel: PASSTHROUGH_SENTINEL,
            }
            .render(),
            Shell::Fish => FishTemplate {
                cmd,
                sentinel: PASSTHROUGH_SENTINEL,
            }
            .render(),
        };
        rendered.context("Failed to render shell wrapper template")
    }

    /// The line added to the shell's config file for integration.
    pub fn config_line(&self, cmd: &str) -> String {
        match self {
            Shell::Bash => format!("eval \"$({cmd} init bash --show)\""),
            Shell::Zsh => format!("eval \"$({cmd} init zsh --show)\""),
            Shell::Fish => format!("{cmd} init fish --show | source"),
        }
    }

    /// The config file the integration line goes into.
    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        let home = home::home_dir().context("Could not determine home directory")?;
        Ok(match self {
            Shell::Bash => home.join(".bashrc"),
            Shell::Zsh => std::env::var_os("ZDOTDIR")
                .map(PathBuf::from)
                .unwrap_or(home)
                .join(".zshrc"),
            Shell::Fish => home.join(".config/fish/conf.d/workstack.fish"),
        })
    }

    /// Whether the config file already carries the integration line.
    pub fn is_configured(&self, cmd: &str) -> anyhow::Result<bool> {
        let path = self.config_path()?;
        if !path.exists() {
            return Ok(false);
        }
        let needle = self.config_line(cmd);
        let file = std::fs::File::open(&path)?;
        for line in BufReader::new(file).lines() {
            if line?.trim() == needle {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapper_renders_for_each_shell() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
            let wrapper = shell.render_wrapper("workstack").unwrap();
            assert!(wrapper.contains("workstack"), "{shell} wrapper missing cmd");
            assert!(
                wrapper.contains(PASSTHROUGH_SENTINEL),
                "{shell} wrapper missing sentinel"
            );
            assert!(wrapper.contains("__switch-eval") || wrapper.contains("-eval"));
        }
    }

    #[test]
    fn test_bash_wrapper_defines_function() {
        let wrapper = Shell::Bash.render_wrapper("workstack").unwrap();
        assert!(wrapper.contains("workstack() {"));
        assert!(wrapper.contains("source \"$script\""));
    }

    #[test]
    fn test_fish_wrapper_defines_function() {
        let wrapper = Shell::Fish.render_wrapper("workstack").unwrap();
        assert!(wrapper.contains("function workstack"));
        assert!(wrapper.contains("source $script"));
    }

    #[test]
    fn test_config_lines() {
        assert_eq!(
            Shell::Bash.config_line("workstack"),
            "eval \"$(workstack init bash --show)\""
        );
        assert_eq!(
            Shell::Fish.config_line("workstack"),
            "workstack init fish --show | source"
        );
    }

    #[test]
    fn test_shell_parse_and_display() {
        assert_eq!("bash".parse::<Shell>().unwrap(), Shell::Bash);
        assert_eq!("ZSH".parse::<Shell>().unwrap(), Shell::Zsh);
        assert_eq!(Shell::Fish.to_string(), "fish");
    }
}
