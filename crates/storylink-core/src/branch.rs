//! Branch selectors and branch-name story ids.
//!
//! # Selector semantics
//!
//! A selector is compared literally first. When that fails it is compiled as
//! a regular expression and tested with **unanchored** partial matching, the
//! way host-style selectors such as `feature/*` are written by hand. This is
//! intentionally loose: `main` also matches `not-main-really`, and
//! `feature/*` matches any branch containing `feature` (the `*` applies to the
//! `/`). Rule authors who need exact behavior anchor their selectors
//! (`^main$`).
//!
//! A selector that is not a valid regex can still match literally but never
//! matches as a pattern.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::PatternError;
use crate::marker::StoryId;

/// Default pattern for story ids embedded in branch names, e.g. `bug/sc-22205-fix`.
pub const DEFAULT_BRANCH_PATTERN: &str = r"sc-(\d+)";

static DEFAULT_BRANCH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_BRANCH_PATTERN).expect("default branch regex is valid"));

/// Whether `selector` accepts `branch`.
pub fn branch_selector_matches(selector: &str, branch: &str) -> bool {
    !is_blank(selector) && (selector == branch || regex_matches(selector, branch))
}

/// Whether any selector in `selectors` accepts `branch`.
///
/// Every selector is checked literally before any is compiled. Blank
/// selectors never match.
pub fn branch_set_matches<S: AsRef<str>>(selectors: &[S], branch: &str) -> bool {
    let usable = || {
        selectors
            .iter()
            .map(|s| -> &str { s.as_ref() })
            .filter(|s| !is_blank(s))
    };
    usable().any(|s| s == branch) || usable().any(|s| regex_matches(s, branch))
}

fn is_blank(selector: &str) -> bool {
    selector.trim().is_empty()
}

/// Whether `selector` compiles as a regular expression.
pub fn is_valid_selector_pattern(selector: &str) -> bool {
    Regex::new(selector).is_ok()
}

fn regex_matches(selector: &str, branch: &str) -> bool {
    match Regex::new(selector) {
        Ok(re) => re.is_match(branch),
        Err(e) => {
            tracing::debug!(selector = %selector, error = %e, "branch selector is not a valid pattern");
            false
        }
    }
}

/// Caller-configurable pattern locating a story id inside a branch name.
///
/// The pattern must have exactly one capture group holding the digits.
#[derive(Debug, Clone)]
pub struct BranchIdPattern {
    regex: Regex,
}

impl Default for BranchIdPattern {
    fn default() -> Self {
        Self {
            regex: DEFAULT_BRANCH_REGEX.clone(),
        }
    }
}

impl BranchIdPattern {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let regex = Regex::new(pattern).map_err(|source| PatternError::Invalid {
            pattern: pattern.to_string(),
            source,
        })?;
        // captures_len counts the implicit whole-match group.
        let groups = regex.captures_len() - 1;
        if groups != 1 {
            return Err(PatternError::CaptureGroups {
                pattern: pattern.to_string(),
                groups,
            });
        }
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// The story id embedded in `branch`, if the pattern matches and the
    /// captured text is a number.
    pub fn extract(&self, branch: &str) -> Option<StoryId> {
        let caps = self.regex.captures(branch)?;
        caps.get(1)?.as_str().parse::<u64>().ok().map(StoryId)
    }
}
