//! The built-in status collectors.

use std::sync::Arc;

use super::{
    DependenciesSection, EnvironmentSection, GitSection, PlanSection, PrSection, Section,
    StackSection, StatusCollector, StatusContext,
};
use crate::plan::{PLAN_FILENAME, extract_plan_title};

/// Lockfiles the dependencies collector looks for.
const LOCKFILES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "uv.lock",
    "poetry.lock",
    "go.sum",
];

/// The standard collector set, in render order.
pub fn default_collectors() -> Vec<Arc<dyn StatusCollector>> {
    vec![
        Arc::new(GitCollector),
        Arc::new(StackCollector),
        Arc::new(PrCollector),
        Arc::new(EnvironmentCollector),
        Arc::new(DependenciesCollector),
        Arc::new(PlanCollector),
    ]
}

struct GitCollector;

impl StatusCollector for GitCollector {
    fn name(&self) -> &'static str {
        "git"
    }

    fn is_available(&self, _ctx: &StatusContext) -> bool {
        true
    }

    fn collect(&self, ctx: &StatusContext) -> anyhow::Result<Section> {
        let wt = ctx.repo.worktree_at(&ctx.worktree_path);
        let branch = wt.branch()?;
        let head_sha = wt.head_sha()?;
        let is_dirty = wt.is_dirty()?;
        let has_staged_changes = wt.has_staged_changes()?;

        let (ahead, behind) = match ctx.repo.default_branch() {
            Ok(default) if branch.as_deref() != Some(default.as_str()) => {
                wt.ahead_behind(&default).unwrap_or((0, 0))
            }
            _ => (0, 0),
        };

        Ok(Section::Git(GitSection {
            branch,
            head_sha,
            is_dirty,
            has_staged_changes,
            ahead,
            behind,
        }))
    }
}

struct StackCollector;

impl StatusCollector for StackCollector {
    fn name(&self) -> &'static str {
        "stack"
    }

    fn is_available(&self, ctx: &StatusContext) -> bool {
        ctx.config.use_graphite
    }

    fn collect(&self, ctx: &StatusContext) -> anyhow::Result<Section> {
        let branch = ctx
            .repo
            .worktree_at(&ctx.worktree_path)
            .branch()?
            .ok_or_else(|| anyhow::anyhow!("detached HEAD has no stack position"))?;

        let branches = crate::graphite::get_all_branches(&ctx.repo)?;
        let stack = crate::stack::get_branch_stack(&branches, &branch)
            .ok_or_else(|| anyhow::anyhow!("branch '{branch}' is not tracked by the stack tool"))?;
        let position = stack
            .iter()
            .position(|b| b == &branch)
            .expect("stack always contains its own branch");

        Ok(Section::Stack(StackSection { stack, position }))
    }
}

struct PrCollector;

impl StatusCollector for PrCollector {
    fn name(&self) -> &'static str {
        "pr"
    }

    fn is_available(&self, ctx: &StatusContext) -> bool {
        ctx.config.show_pr_info
    }

    fn collect(&self, ctx: &StatusContext) -> anyhow::Result<Section> {
        let branch = ctx
            .repo
            .worktree_at(&ctx.worktree_path)
            .branch()?
            .ok_or_else(|| anyhow::anyhow!("detached HEAD has no PR"))?;

        let (state, number, title) = crate::github::get_pr_status(&ctx.repo_root, &branch)
            .ok_or_else(|| anyhow::anyhow!("no PR for branch '{branch}'"))?;

        Ok(Section::Pr(PrSection {
            state,
            number,
            title,
        }))
    }
}

struct EnvironmentCollector;

impl StatusCollector for EnvironmentCollector {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn is_available(&self, _ctx: &StatusContext) -> bool {
        true
    }

    fn collect(&self, ctx: &StatusContext) -> anyhow::Result<Section> {
        Ok(Section::Environment(EnvironmentSection {
            has_env_file: ctx.worktree_path.join(".env").is_file(),
            has_venv: ctx.worktree_path.join(".venv").is_dir(),
        }))
    }
}

struct DependenciesCollector;

impl StatusCollector for DependenciesCollector {
    fn name(&self) -> &'static str {
        "dependencies"
    }

    fn is_available(&self, _ctx: &StatusContext) -> bool {
        true
    }

    fn collect(&self, ctx: &StatusContext) -> anyhow::Result<Section> {
        let lockfiles = LOCKFILES
            .iter()
            .filter(|name| ctx.worktree_path.join(name).is_file())
            .map(|name| name.to_string())
            .collect();
        Ok(Section::Dependencies(DependenciesSection { lockfiles }))
    }
}

struct PlanCollector;

impl StatusCollector for PlanCollector {
    fn name(&self) -> &'static str {
        "plan"
    }

    fn is_available(&self, ctx: &StatusContext) -> bool {
        ctx.worktree_path.join(PLAN_FILENAME).is_file()
    }

    fn collect(&self, ctx: &StatusContext) -> anyhow::Result<Section> {
        let title = extract_plan_title(&ctx.worktree_path.join(PLAN_FILENAME))
            .ok_or_else(|| anyhow::anyhow!("plan file has no title"))?;
        Ok(Section::Plan(PlanSection { title }))
    }
}
