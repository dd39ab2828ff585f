//! Repository reference parsing.

use std::fmt;

use thiserror::Error;

/// The reference did not have enough `/`-separated segments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid repository URL: {reference}")]
pub struct ReferenceParseError {
    /// The offending reference.
    pub reference: String,
}

/// Owner and repository name extracted from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    /// Account or organization owning the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoRef {
    /// Extracts the owner and repository from `https://<host>/<owner>/<repo>[/...]`.
    ///
    /// The reference is split on `/`; segments 0–2 hold the scheme and host,
    /// segment 3 is the owner and segment 4 the repository.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than five segments.
    pub fn parse(reference: &str) -> Result<Self, ReferenceParseError> {
        let segments: Vec<&str> = reference.split('/').collect();
        if segments.len() < 5 {
            return Err(ReferenceParseError { reference: reference.to_string() });
        }
        Ok(Self { owner: segments[3].to_string(), name: segments[4].to_string() })
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_and_repo() {
        let repo = RepoRef::parse("https://example.com/acme/app").unwrap();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "app");
        assert_eq!(repo.to_string(), "acme/app");
    }

    #[test]
    fn ignores_trailing_segments() {
        let repo = RepoRef::parse("https://github.com/acme/app/issues/7").unwrap();
        assert_eq!((repo.owner.as_str(), repo.name.as_str()), ("acme", "app"));
    }

    #[test]
    fn takes_segments_three_and_four_of_any_long_enough_reference() {
        for reference in ["a/b/c/d/e", "///x/y", "s://h/o/r/", "git@host:/x/y/z/w"] {
            let segments: Vec<&str> = reference.split('/').collect();
            let repo = RepoRef::parse(reference).unwrap();
            assert_eq!(repo.owner, segments[3], "{reference}");
            assert_eq!(repo.name, segments[4], "{reference}");
        }
    }

    #[test]
    fn rejects_short_references() {
        for reference in ["", "acme/app", "https://github.com/acme", "https://github.com"] {
            let err = RepoRef::parse(reference).unwrap_err();
            assert_eq!(err.reference, reference);
        }
    }
}
