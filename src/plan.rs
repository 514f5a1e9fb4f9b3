//! Plan file (`.PLAN.md`) helpers.

use std::path::Path;

/// Filename a plan is stored under inside a worktree.
pub const PLAN_FILENAME: &str = ".PLAN.md";

/// Extract the title from a plan file: the first markdown heading, or the
/// first non-empty line as a fallback. `None` when the file is absent or
/// effectively empty.
pub fn extract_plan_title(plan_path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(plan_path).ok()?;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let title = trimmed.trim_start_matches('#').trim();
        if title.is_empty() {
            continue;
        }
        return Some(title.to_string());
    }
    None
}
