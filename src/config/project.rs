//! Per-repository configuration
//!
//! A `config.toml` in the repo's workstacks directory (or the repo root as a
//! fallback) configures `.env` templates and post-create commands:
//!
//! ```toml
//! [env]
//! DAGSTER_GIT_REPO_DIR = "{worktree_path}"
//!
//! [post_create]
//! shell = "bash"
//! commands = [
//!   "uv venv",
//!   "uv run make dev_install",
//! ]
//! ```

use std::path::Path;

use anyhow::Context;
use indexmap::IndexMap;
use serde::Deserialize;

/// Per-repository configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    /// `.env` templates. Order matters: lines are rendered in file order.
    #[serde(default)]
    pub env: IndexMap<String, String>,

    #[serde(default)]
    pub post_create: PostCreateConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostCreateConfig {
    /// Shell to run the commands under (`<shell> -lc <cmd>`). When unset,
    /// commands are tokenized and run directly.
    #[serde(default)]
    pub shell: Option<String>,

    /// Commands run sequentially in the new worktree.
    #[serde(default)]
    pub commands: Vec<String>,
}

impl ProjectConfig {
    /// Load the per-repo config, checking the workstacks directory first and
    /// the repository root second. Absent files yield defaults; a present
    /// but malformed file is an error.
    pub fn load(workstacks_dir: &Path, repo_root: &Path) -> anyhow::Result<Self> {
        for dir in [workstacks_dir, repo_root] {
            let path = dir.join("config.toml");
            if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Invalid TOML in {}", path.display()));
            }
        }
        Ok(Self::default())
    }
}

/// Substitute `{worktree_path}`, `{repo_root}`, and `{name}` in a template.
///
/// Unknown `{...}` sequences pass through verbatim.
fn expand_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

/// Quote a value for a `.env` file: double quotes, with `\` and `"` escaped.
fn quote_env_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Render the `.env` content for a new worktree: configured templates in
/// file order, then the three built-ins.
pub fn render_env_content(
    cfg: &ProjectConfig,
    worktree_path: &Path,
    repo_root: &Path,
    name: &str,
) -> String {
    let wt = worktree_path.to_string_lossy();
    let root = repo_root.to_string_lossy();
    let vars: [(&str, &str); 3] = [("worktree_path", &wt), ("repo_root", &root), ("name", name)];

    let mut lines = Vec::new();
    for (key, template) in &cfg.env {
        let value = expand_template(template, &vars);
        lines.push(format!("{key}={}", quote_env_value(&value)));
    }

    lines.push(format!("WORKTREE_PATH={}", quote_env_value(&wt)));
    lines.push(format!("REPO_ROOT={}", quote_env_value(&root)));
    lines.push(format!("WORKTREE_NAME={}", quote_env_value(name)));

    lines.join("\n") + "\n"
}
