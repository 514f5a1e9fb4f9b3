//! Worktree and branch name derivation.

use once_cell::sync::Lazy;
use regex::Regex;

static UNSAFE_DIR_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9.-]+").unwrap());
static UNSAFE_BRANCH_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9._/-]+").unwrap());
static HYPHEN_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// Sanitize a worktree name for use as a directory name.
///
/// - Lowercases input
/// - Replaces underscores with hyphens
/// - Replaces characters outside `[a-z0-9.-]` with `-`
/// - Collapses consecutive `-`
/// - Strips leading/trailing `-`
///
/// Returns `"work"` if the result is empty.
pub fn sanitize_worktree_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase().replace('_', "-");
    let replaced = UNSAFE_DIR_CHARS.replace_all(&lowered, "-");
    let collapsed = HYPHEN_RUNS.replace_all(&replaced, "-");
    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        "work".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitize an arbitrary name into a predictable branch component.
///
/// - Lowercases input
/// - Replaces characters outside `[a-z0-9._/-]` with `-`
/// - Collapses consecutive `-`
/// - Strips leading/trailing `-` and `/`
///
/// Returns `"work"` if the result is empty.
pub fn sanitize_branch_component(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let replaced = UNSAFE_BRANCH_CHARS.replace_all(&lowered, "-");
    let collapsed = HYPHEN_RUNS.replace_all(&replaced, "-");
    let trimmed = collapsed.trim_matches(|c| c == '-' || c == '/');
    if trimmed.is_empty() {
        "work".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Default branch name for a worktree with the given name.
pub fn default_branch_for_worktree(name: &str) -> String {
    sanitize_branch_component(name)
}

/// Remove "plan" and "implementation plan" from a filename stem as whole
/// words, preserving the surrounding separators.
///
/// If removal would leave nothing, progressively less is removed: first the
/// "implementation plan" pairing is given up (so `implementation-plan`
/// becomes `implementation`), then the original is returned unchanged (so
/// `plan` stays `plan`).
///
/// Examples:
///   "devclikit-extraction-plan" → "devclikit-extraction"
///   "implementation-plan-for-auth" → "for-auth"
///   "feature_implementation_plan" → "feature"
pub fn strip_plan_from_filename(stem: &str) -> String {
    let full = strip_plan_tokens(stem, true);
    if !full.is_empty() {
        return full;
    }
    let plan_only = strip_plan_tokens(stem, false);
    if !plan_only.is_empty() {
        return plan_only;
    }
    stem.to_string()
}

fn is_separator(c: char) -> bool {
    c == '-' || c == '_' || c.is_whitespace()
}

/// Split `stem` into tokens, drop every whole-word "plan" (and, when
/// `pair_implementation` is set, an "implementation" immediately preceding
/// one), and rejoin the survivors with single separator characters.
fn strip_plan_tokens(stem: &str, pair_implementation: bool) -> String {
    // (separator run before token, token)
    let mut tokens: Vec<(String, String)> = Vec::new();
    let mut sep = String::new();
    let mut word = String::new();
    for c in stem.chars() {
        if is_separator(c) {
            if !word.is_empty() {
                tokens.push((std::mem::take(&mut sep), std::mem::take(&mut word)));
            }
            sep.push(c);
        } else {
            word.push(c);
        }
    }
    if !word.is_empty() {
        tokens.push((sep, word));
    }

    let mut removed = vec![false; tokens.len()];
    for i in 0..tokens.len() {
        if tokens[i].1.eq_ignore_ascii_case("plan") {
            removed[i] = true;
            if pair_implementation
                && i > 0
                && !removed[i - 1]
                && tokens[i - 1].1.eq_ignore_ascii_case("implementation")
            {
                removed[i - 1] = true;
            }
        }
    }

    let mut result = String::new();
    let mut pending_sep: Option<char> = None;
    for (i, (sep, token)) in tokens.iter().enumerate() {
        if let Some(c) = sep.chars().next() {
            pending_sep.get_or_insert(c);
        }
        if removed[i] {
            continue;
        }
        if !result.is_empty()
            && let Some(c) = pending_sep
        {
            result.push(c);
        }
        result.push_str(token);
        pending_sep = None;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_worktree_name() {
        assert_eq!(sanitize_worktree_name("Feature_X"), "feature-x");
        assert_eq!(sanitize_worktree_name("fix/login bug"), "fix-login-bug");
        assert_eq!(sanitize_worktree_name("--weird--"), "weird");
        assert_eq!(sanitize_worktree_name("v1.2.3"), "v1.2.3");
        assert_eq!(sanitize_worktree_name("///"), "work");
        assert_eq!(sanitize_worktree_name(""), "work");
    }

    #[test]
    fn test_sanitize_branch_component() {
        assert_eq!(sanitize_branch_component("Feature X"), "feature-x");
        assert_eq!(sanitize_branch_component("feature/auth"), "feature/auth");
        assert_eq!(sanitize_branch_component("/leading/"), "leading");
        assert_eq!(sanitize_branch_component("!!!"), "work");
    }

    #[test]
    fn test_default_branch_for_worktree() {
        assert_eq!(default_branch_for_worktree("My Feature"), "my-feature");
    }

    #[test]
    fn test_strip_plan_trailing() {
        assert_eq!(
            strip_plan_from_filename("devclikit-extraction-plan"),
            "devclikit-extraction"
        );
        assert_eq!(strip_plan_from_filename("my-feature-plan"), "my-feature");
    }

    #[test]
    fn test_strip_implementation_plan_pair() {
        assert_eq!(strip_plan_from_filename("implementation-plan-for-auth"), "for-auth");
        assert_eq!(strip_plan_from_filename("feature_implementation_plan"), "feature");
    }

    #[test]
    fn test_strip_plan_middle_preserves_separator() {
        assert_eq!(strip_plan_from_filename("auth-plan-v2"), "auth-v2");
    }

    #[test]
    fn test_strip_plan_case_insensitive() {
        assert_eq!(strip_plan_from_filename("Auth-PLAN"), "Auth");
    }

    #[test]
    fn test_strip_plan_preserves_degenerate_inputs() {
        assert_eq!(strip_plan_from_filename("plan"), "plan");
        assert_eq!(strip_plan_from_filename("implementation-plan"), "implementation");
    }

    #[test]
    fn test_strip_plan_leaves_embedded_words_alone() {
        // "planning" is not the whole word "plan"
        assert_eq!(strip_plan_from_filename("planning-doc"), "planning-doc");
        assert_eq!(strip_plan_from_filename("floorplan"), "floorplan");
    }

    // Sanitize(strip_plan(F)) is never empty
    #[test]
    fn test_strip_then_sanitize_never_empty() {
        for stem in ["plan", "plan-plan", "implementation-plan", "", "---", "x-plan"] {
            let name = sanitize_worktree_name(&strip_plan_from_filename(stem));
            assert!(!name.is_empty(), "empty for {stem:?}");
        }
    }
}
