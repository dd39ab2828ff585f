//! Finding the remote counterpart of a declared issue.

use crate::ports::issues::RemoteIssue;

/// Outcome of matching a title against the remote issue list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleMatch<'a> {
    /// No remote issue carries the title.
    None,
    /// Exactly one remote issue carries the title.
    Unique(&'a RemoteIssue),
    /// Several remote issues carry the title; holds how many.
    Ambiguous(usize),
}

/// Case-insensitive title comparison.
fn same_title(a: &str, b: &str) -> bool {
    a.chars().flat_map(char::to_lowercase).eq(b.chars().flat_map(char::to_lowercase))
}

/// Returns the first issue whose title equals `title`, ignoring case.
///
/// "First" is tracker list order, which is not guaranteed stable across calls.
#[must_use]
pub fn find_match<'a>(title: &str, issues: &'a [RemoteIssue]) -> Option<&'a RemoteIssue> {
    issues.iter().find(|issue| same_title(&issue.title, title))
}

/// Like [`find_match`], but reports duplicates instead of picking one.
#[must_use]
pub fn match_title<'a>(title: &str, issues: &'a [RemoteIssue]) -> TitleMatch<'a> {
    let mut matches = issues.iter().filter(|issue| same_title(&issue.title, title));
    match (matches.next(), matches.count()) {
        (None, _) => TitleMatch::None,
        (Some(issue), 0) => TitleMatch::Unique(issue),
        (Some(_), rest) => TitleMatch::Ambiguous(rest + 1),
    }
}
