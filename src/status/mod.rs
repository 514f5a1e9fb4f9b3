//! Parallel status collection.
//!
//! The `status` command fans out to independent collectors, each with a time
//! budget. A slow or failing collector leaves its slot empty; it never fails
//! the command. Renderers skip empty slots.

mod collectors;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::GlobalConfig;
use crate::git::Repository;
use crate::github::PrState;

pub use collectors::default_collectors;

/// Per-collector time budget.
pub const DEFAULT_COLLECTOR_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a collector may consult. Cloned into each worker thread.
#[derive(Clone)]
pub struct StatusContext {
    pub repo: Repository,
    pub config: GlobalConfig,
    pub repo_root: PathBuf,
    pub worktree_path: PathBuf,
}

/// Identity of a worktree in a status report.
#[derive(Debug, Clone, PartialEq)]
pub struct WorktreeDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub branch: Option<String>,
    pub is_root: bool,
}

#[derive(Debug, Clone)]
pub struct GitSection {
    pub branch: Option<String>,
    pub head_sha: String,
    pub is_dirty: bool,
    pub has_staged_changes: bool,
    /// Commits ahead/behind the default branch
    pub ahead: usize,
    pub behind: usize,
}

#[derive(Debug, Clone)]
pub struct StackSection {
    /// Linear stack from trunk to leaf
    pub stack: Vec<String>,
    /// Index of the current branch within `stack`
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct PrSection {
    pub state: PrState,
    pub number: u64,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct EnvironmentSection {
    pub has_env_file: bool,
    pub has_venv: bool,
}

#[derive(Debug, Clone)]
pub struct DependenciesSection {
    /// Lockfiles present in the worktree
    pub lockfiles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PlanSection {
    pub title: String,
}

/// One collector's contribution, routed to its snapshot slot by variant.
#[derive(Debug, Clone)]
pub enum Section {
    Git(GitSection),
    Stack(StackSection),
    Pr(PrSection),
    Environment(EnvironmentSection),
    Dependencies(DependenciesSection),
    Plan(PlanSection),
}

/// The assembled status report. Every slot may be empty: collector timeouts
/// and failures degrade to absence, never to a command failure.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub worktree: WorktreeDescriptor,
    pub git: Option<GitSection>,
    pub stack: Option<StackSection>,
    pub pr: Option<PrSection>,
    pub environment: Option<EnvironmentSection>,
    pub dependencies: Option<DependenciesSection>,
    pub plan: Option<PlanSection>,
    pub related_worktrees: Vec<WorktreeDescriptor>,
}

/// A source of one status section.
pub trait StatusCollector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap pre-check; unavailable collectors are not scheduled.
    fn is_available(&self, ctx: &StatusContext) -> bool;

    fn collect(&self, ctx: &StatusContext) -> anyhow::Result<Section>;
}

/// Coordinates collectors and assembles the final snapshot.
pub struct StatusOrchestrator {
    collectors: Vec<Arc<dyn StatusCollector>>,
    timeout: Duration,
}

impl StatusOrchestrator {
    pub fn new(collectors: Vec<Arc<dyn StatusCollector>>) -> Self {
        Self {
            collectors,
            timeout: DEFAULT_COLLECTOR_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run every available collector on its own thread and assemble the
    /// snapshot.
    ///
    /// Workers send `(name, result)` over a channel; the drain loop is
    /// bounded by `N * timeout`. A worker that misses the deadline is
    /// abandoned, not killed - its result is simply discarded, so it cannot
    /// affect correctness.
    pub fn collect(&self, ctx: &StatusContext) -> StatusSnapshot {
        let worktree = describe_worktree(ctx, &ctx.worktree_path);

        let available: Vec<Arc<dyn StatusCollector>> = self
            .collectors
            .iter()
            .filter(|c| c.is_available(ctx))
            .cloned()
            .collect();

        let (tx, rx) = crossbeam_channel::unbounded();
        let shared_ctx = Arc::new(ctx.clone());

        for collector in &available {
            let collector = Arc::clone(collector);
            let ctx = Arc::clone(&shared_ctx);
            let tx = tx.clone();
            std::thread::spawn(move || {
                let result = collector.collect(&ctx);
                let _ = tx.send((collector.name(), result));
            });
        }
        drop(tx);

        let mut snapshot = StatusSnapshot {
            worktree,
            git: None,
            stack: None,
            pr: None,
            environment: None,
            dependencies: None,
            plan: None,
            related_worktrees: Vec::new(),
        };

        let deadline = Instant::now() + self.timeout * (available.len().max(1) as u32);
        let mut remaining = available.len();
        while remaining > 0 {
            match rx.recv_deadline(deadline) {
                Ok((name, Ok(section))) => {
                    remaining -= 1;
                    assign_section(&mut snapshot, section);
                    log::debug!("collector '{name}' completed");
                }
                Ok((name, Err(e))) => {
                    remaining -= 1;
                    log::debug!("collector '{name}' failed: {e}");
                }
                Err(_) => {
                    log::debug!("{remaining} collector(s) did not complete in time");
                    break;
                }
            }
        }

        // Cheap and ordering-sensitive: runs synchronously after the fan-out
        snapshot.related_worktrees = related_worktrees(ctx);

        snapshot
    }
}

fn assign_section(snapshot: &mut StatusSnapshot, section: Section) {
    match section {
        Section::Git(s) => snapshot.git = Some(s),
        Section::Stack(s) => snapshot.stack = Some(s),
        Section::Pr(s) => snapshot.pr = Some(s),
        Section::Environment(s) => snapshot.environment = Some(s),
        Section::Dependencies(s) => snapshot.dependencies = Some(s),
        Section::Plan(s) => snapshot.plan = Some(s),
    }
}

fn describe_worktree(ctx: &StatusContext, path: &Path) -> WorktreeDescriptor {
    let resolved = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let root = dunce::canonicalize(&ctx.repo_root).unwrap_or_else(|_| ctx.repo_root.clone());
    let is_root = resolved == root;
    let name = if is_root {
        "root".to_string()
    } else {
        resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    let branch = ctx.repo.worktree_at(&resolved).branch().ok().flatten();

    WorktreeDescriptor {
        name,
        path: resolved,
        branch,
        is_root,
    }
}

/// Other worktrees of the same repository, current one excluded.
fn related_worktrees(ctx: &StatusContext) -> Vec<WorktreeDescriptor> {
    let Ok(worktrees) = ctx.repo.list_worktrees() else {
        return Vec::new();
    };
    let current =
        dunce::canonicalize(&ctx.worktree_path).unwrap_or_else(|_| ctx.worktree_path.clone());
    let root = dunce::canonicalize(&ctx.repo_root).unwrap_or_else(|_| ctx.repo_root.clone());

    worktrees
        .into_iter()
        .filter(|wt| wt.path.exists())
        .filter_map(|wt| {
            let resolved = dunce::canonicalize(&wt.path).unwrap_or(wt.path);
            if resolved == current {
                return None;
            }
            let is_root = resolved == root;
            let name = if is_root {
                "root".to_string()
            } else {
                resolved.file_name()?.to_string_lossy().into_owned()
            };
            Some(WorktreeDescriptor {
                name,
                path: resolved,
                branch: wt.branch,
                is_root,
            })
        })
        .collect()
}
