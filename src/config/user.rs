//! Global configuration
//!
//! A single TOML file at `~/.workstack/config.toml` holds machine-wide
//! settings. Reads go through an in-process cache; every successful write
//! invalidates the cache (there is no cross-process locking — git's own
//! locking is the only multi-process guard this tool relies on).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, bail};
use serde::Deserialize;

/// Default directory prefix for rebase-stack worktrees.
pub const DEFAULT_REBASE_STACK_LOCATION: &str = ".rebase-stack";

/// Global workstack configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConfig {
    /// Root directory holding one subdirectory of worktrees per repository.
    /// Expanded (`~`) and resolved to an absolute path.
    pub workstacks_root: PathBuf,
    /// Whether Graphite integration (gt) is enabled.
    pub use_graphite: bool,
    /// Whether `workstack init` has installed the shell wrapper.
    pub shell_setup_complete: bool,
    /// Whether `list` shows PR information.
    pub show_pr_info: bool,
    /// Whether `list` fetches CI check status by default.
    pub show_pr_checks: bool,
    /// Directory prefix for rebase-stack worktrees.
    pub rebase_stack_location: String,
}

/// On-disk shape. Extra keys are ignored for forward compatibility; typed
/// keys must decode with their precise types.
#[derive(Debug, Default, Deserialize)]
struct RawGlobalConfig {
    workstacks_root: Option<String>,
    use_graphite: Option<bool>,
    shell_setup_complete: Option<bool>,
    show_pr_info: Option<bool>,
    show_pr_checks: Option<bool>,
    rebase_stack_location: Option<String>,
}

/// The keys `workstack config set` accepts, with their expected types.
pub const CONFIG_KEYS: &[(&str, ConfigValueKind)] = &[
    ("workstacks_root", ConfigValueKind::Path),
    ("use_graphite", ConfigValueKind::Bool),
    ("shell_setup_complete", ConfigValueKind::Bool),
    ("show_pr_info", ConfigValueKind::Bool),
    ("show_pr_checks", ConfigValueKind::Bool),
    ("rebase_stack_location", ConfigValueKind::String),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValueKind {
    Path,
    String,
    Bool,
}

static CACHE: Mutex<Option<GlobalConfig>> = Mutex::new(None);

/// Directory holding the global config (`~/.workstack/`).
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = home::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".workstack"))
}

/// Path of the global config file.
pub fn config_path() -> anyhow::Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

impl GlobalConfig {
    /// Load the global config, using the process-wide cache.
    pub fn load() -> anyhow::Result<Self> {
        {
            let cache = CACHE.lock().unwrap();
            if let Some(ref cfg) = *cache {
                return Ok(cfg.clone());
            }
        }
        let cfg = Self::load_from(&config_path()?)?;
        *CACHE.lock().unwrap() = Some(cfg.clone());
        Ok(cfg)
    }

    /// Load directly from a config file path, bypassing the cache.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            bail!(
                "Global config not found at {}\nRun 'workstack config set workstacks_root <path>' to create it.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw: RawGlobalConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?;

        let Some(root) = raw.workstacks_root.filter(|r| !r.is_empty()) else {
            bail!("Missing 'workstacks_root' in {}", path.display());
        };

        Ok(GlobalConfig {
            workstacks_root: resolve_root(&root),
            use_graphite: raw.use_graphite.unwrap_or(false),
            shell_setup_complete: raw.shell_setup_complete.unwrap_or(false),
            show_pr_info: raw.show_pr_info.unwrap_or(true),
            show_pr_checks: raw.show_pr_checks.unwrap_or(false),
            rebase_stack_location: raw
                .rebase_stack_location
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REBASE_STACK_LOCATION.to_string()),
        })
    }

    /// Set one key in the global config file, preserving every other key
    /// (and any comments) via a partial toml_edit update. Invalidates the
    /// in-process cache on success.
    pub fn set(key: &str, value: &str) -> anyhow::Result<()> {
        set_value_at(&config_path()?, key, value)?;
        invalidate_cache();
        Ok(())
    }
}

/// Invalidate the in-process config cache. Called after every successful
/// write; harmless otherwise.
pub fn invalidate_cache() {
    *CACHE.lock().unwrap() = None;
}

/// Expand `~` and make the workstacks root absolute.
fn resolve_root(raw: &str) -> PathBuf {
    let expanded = shellexpand::tilde(raw).into_owned();
    let path = PathBuf::from(expanded);
    if path.is_absolute() {
        dunce::canonicalize(&path).unwrap_or(path)
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path)
    }
}

/// Partial-update implementation shared by [`GlobalConfig::set`] and tests.
///
/// The updated document is written to a sibling temp file and renamed into
/// place, so a failed write never truncates the previous config.
pub fn set_value_at(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    use std::io::Write;

    let kind = CONFIG_KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, kind)| *kind)
        .with_context(|| {
            let known: Vec<&str> = CONFIG_KEYS.iter().map(|(k, _)| *k).collect();
            format!("Unknown config key '{key}'. Known keys: {}", known.join(", "))
        })?;

    let content = if path.exists() {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        String::new()
    };

    let mut doc: toml_edit::DocumentMut = content
        .parse()
        .with_context(|| format!("Invalid TOML in {}", path.display()))?;

    match kind {
        ConfigValueKind::Bool => {
            let parsed: bool = value
                .parse()
                .with_context(|| format!("'{key}' expects true or false, got '{value}'"))?;
            doc[key] = toml_edit::value(parsed);
        }
        ConfigValueKind::Path | ConfigValueKind::String => {
            doc[key] = toml_edit::value(value);
        }
    }

    let parent = path
        .parent()
        .with_context(|| format!("Config path has no parent: {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .context("Failed to create temporary config file")?;
    tmp.write_all(doc.to_string().as_bytes())
        .context("Failed to write config")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}

/// Read one key back as a display string (for `workstack config get`).
pub fn get_value_at(path: &Path, key: &str) -> anyhow::Result<Option<String>> {
    if CONFIG_KEYS.iter().all(|(k, _)| *k != key) {
        let known: Vec<&str> = CONFIG_KEYS.iter().map(|(k, _)| *k).collect();
        bail!("Unknown config key '{key}'. Known keys: {}", known.join(", "));
    }
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let doc: toml_edit::DocumentMut = content
        .parse()
        .with_context(|| format!("Invalid TOML in {}", path.display()))?;
    Ok(doc.get(key).map(|item| {
        let rendered = item.to_string();
        rendered.trim().trim_matches('"').to_string()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(tmp.path(), "workstacks_root = \"/tmp/ws\"\n");
        let cfg = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(cfg.workstacks_root, PathBuf::from("/tmp/ws"));
        assert!(!cfg.use_graphite);
        assert!(cfg.show_pr_info);
        assert!(!cfg.show_pr_checks);
        assert_eq!(cfg.rebase_stack_location, DEFAULT_REBASE_STACK_LOCATION);
    }

    #[test]
    fn test_load_full_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            "workstacks_root = \"/tmp/ws\"\nuse_graphite = true\nshell_setup_complete = true\nshow_pr_info = false\nshow_pr_checks = true\nrebase_stack_location = \".stacks\"\n",
        );
        let cfg = GlobalConfig::load_from(&path).unwrap();
        assert!(cfg.use_graphite);
        assert!(cfg.shell_setup_complete);
        assert!(!cfg.show_pr_info);
        assert!(cfg.show_pr_checks);
        assert_eq!(cfg.rebase_stack_location, ".stacks");
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(tmp.path(), "use_graphite = true\n");
        let err = GlobalConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("workstacks_root"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = GlobalConfig::load_from(&tmp.path().join("config.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_toml_is_never_swallowed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(tmp.path(), "workstacks_root = [broken\n");
        assert!(GlobalConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            "workstacks_root = \"/tmp/ws\"\nfuture_feature = \"yes\"\n",
        );
        assert!(GlobalConfig::load_from(&path).is_ok());
    }

    // Partial updates keep unrelated keys
    #[test]
    fn test_set_preserves_other_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            "# my settings\nworkstacks_root = \"/tmp/ws\"\nuse_graphite = true\n",
        );

        set_value_at(&path, "show_pr_checks", "true").unwrap();
        set_value_at(&path, "rebase_stack_location", ".stacks").unwrap();

        let cfg = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(cfg.workstacks_root, PathBuf::from("/tmp/ws"));
        assert!(cfg.use_graphite);
        assert!(cfg.show_pr_checks);
        assert_eq!(cfg.rebase_stack_location, ".stacks");

        // Comments survive the partial update
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# my settings"));
    }

    #[test]
    fn test_set_creates_file_when_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        set_value_at(&path, "workstacks_root", "/tmp/ws").unwrap();
        let cfg = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(cfg.workstacks_root, PathBuf::from("/tmp/ws"));
    }

    #[test]
    fn test_set_rejects_unknown_key() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(tmp.path(), "workstacks_root = \"/tmp/ws\"\n");
        assert!(set_value_at(&path, "no_such_key", "x").is_err());
    }

    #[test]
    fn test_set_rejects_non_bool_for_bool_key() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(tmp.path(), "workstacks_root = \"/tmp/ws\"\n");
        assert!(set_value_at(&path, "use_graphite", "maybe").is_err());
        // Failed write leaves the prior file intact
        let cfg = GlobalConfig::load_from(&path).unwrap();
        assert!(!cfg.use_graphite);
    }

    #[test]
    fn test_get_value() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(tmp.path(), "workstacks_root = \"/tmp/ws\"\nuse_graphite = true\n");
        assert_eq!(
            get_value_at(&path, "workstacks_root").unwrap().as_deref(),
            Some("/tmp/ws")
        );
        assert_eq!(get_value_at(&path, "use_graphite").unwrap().as_deref(), Some("true"));
        assert_eq!(get_value_at(&path, "show_pr_info").unwrap(), None);
    }
}
