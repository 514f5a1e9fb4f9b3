//! Configuration: global (`~/.workstack/config.toml`) and per-repository.

mod project;
mod user;

pub use project::{PostCreateConfig, ProjectConfig, render_env_content};
pub use user::{
    CONFIG_KEYS, ConfigValueKind, DEFAULT_REBASE_STACK_LOCATION, GlobalConfig, config_dir,
    config_path, get_value_at, invalidate_cache, set_value_at,
};
