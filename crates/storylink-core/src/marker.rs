//! Story markers embedded in free text.
//!
//! A marker is the literal `[sc-<digits>]`; the digits are the story id.
//! Every call site (commit messages, pull-request commits, release notes,
//! pull-request titles) goes through this module.

use std::fmt;
use std::sync::LazyLock;

use regex::{CaptureMatches, Regex};
use serde::{Deserialize, Serialize};

static MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[sc-(\d+)\]").expect("marker regex is valid"));

/// Numeric identifier of a story in the work tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(pub u64);

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StoryId {
    fn from(id: u64) -> Self {
        StoryId(id)
    }
}

/// Lazy, single-pass iterator over the markers in a text, left to right.
///
/// Digit runs too long for a `u64` are skipped.
pub struct Markers<'t> {
    inner: CaptureMatches<'static, 't>,
}

impl Iterator for Markers<'_> {
    type Item = StoryId;

    fn next(&mut self) -> Option<StoryId> {
        self.inner
            .by_ref()
            .find_map(|caps| caps[1].parse::<u64>().ok().map(StoryId))
    }
}

/// Iterate over every marker in `text`.
pub fn markers(text: &str) -> Markers<'_> {
    Markers {
        inner: MARKER_REGEX.captures_iter(text),
    }
}

/// The first story id in `text`, if any.
pub fn extract_one(text: &str) -> Option<StoryId> {
    markers(text).next()
}

/// Every story id in `text`, in document order. Empty when there are none.
pub fn extract_all(text: &str) -> Vec<StoryId> {
    markers(text).collect()
}

/// Render the marker for `id`, e.g. `[sc-42]`.
pub fn format_marker(id: StoryId) -> String {
    format!("[sc-{}]", id.0)
}

/// Append the marker for `id` to `title`.
///
/// Returns `None` when the title already carries that marker, so callers can
/// skip the update entirely.
pub fn annotate_title(title: &str, id: StoryId) -> Option<String> {
    let marker = format_marker(id);
    if title.contains(&marker) {
        return None;
    }
    Some(format!("{title} {marker}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_one_from_commit_message() {
        assert_eq!(
            extract_one("The best commit there ever was [sc-1234567890]"),
            Some(StoryId(1234567890))
        );
    }

    #[test]
    fn extract_one_none_without_marker() {
        assert_eq!(extract_one("Bad bad bad commit"), None);
        assert_eq!(extract_one(""), None);
    }

    #[test]
    fn extract_one_returns_first_match() {
        assert_eq!(extract_one("[sc-1] then [sc-2]"), Some(StoryId(1)));
    }

    #[test]
    fn extract_all_from_release_body() {
        let body = "
        Title

        Some story [sc-12345]
        Another piece of work
        This really cool story [sc-54321]
        ";
        assert_eq!(extract_all(body), vec![StoryId(12345), StoryId(54321)]);
    }

    #[test]
    fn extract_all_empty_without_markers() {
        assert!(extract_all("Some story\nAnother piece of work").is_empty());
        assert!(extract_all("").is_empty());
    }

    #[test]
    fn marker_is_case_sensitive_and_exact() {
        assert_eq!(extract_one("[SC-12]"), None);
        assert_eq!(extract_one("[sc-]"), None);
        assert_eq!(extract_one("[sc-12a]"), None);
        assert_eq!(extract_one("sc-12"), None);
    }

    #[test]
    fn repeated_markers_are_all_reported() {
        assert_eq!(extract_all("[sc-7] [sc-7]"), vec![StoryId(7), StoryId(7)]);
    }

    #[test]
    fn overflowing_digits_are_skipped() {
        let text = "[sc-99999999999999999999999] [sc-5]";
        assert_eq!(extract_all(text), vec![StoryId(5)]);
        assert_eq!(extract_one(text), Some(StoryId(5)));
    }

    #[test]
    fn annotate_title_appends_marker() {
        assert_eq!(
            annotate_title("Add login page", StoryId(42)),
            Some("Add login page [sc-42]".to_string())
        );
    }

    #[test]
    fn annotate_title_is_idempotent() {
        let annotated = annotate_title("Add login page", StoryId(42)).unwrap();
        assert_eq!(annotate_title(&annotated, StoryId(42)), None);
    }

    #[test]
    fn annotate_title_with_other_marker_still_appends() {
        assert_eq!(
            annotate_title("Fix [sc-1]", StoryId(2)),
            Some("Fix [sc-1] [sc-2]".to_string())
        );
    }
}
