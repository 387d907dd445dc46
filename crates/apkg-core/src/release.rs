//! Release history and version resolution.
//!
//! The resolver decides whether the next release of a base version needs a
//! revision suffix by looking at what has already been published. The
//! history is a trait so the algorithm can be exercised without git.

use std::path::PathBuf;
use std::process::Command;

use apkg_schema::{BaseVersion, PackageVersion, VersionError};

/// Errors raised while reading the release history.
#[derive(thiserror::Error, Debug)]
pub enum HistoryError {
    #[error("Could not run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git tag exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Source of previously published version tags.
pub trait ReleaseHistory {
    /// Every published tag (e.g. `v4.6.5`, `v4.6.5.r1`), in any order.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read.
    fn published_tags(&self) -> Result<Vec<String>, HistoryError>;
}

/// History backed by `git tag -l v*` in a repository.
#[derive(Debug, Clone)]
pub struct GitTagHistory {
    repo: PathBuf,
}

impl GitTagHistory {
    /// History of the repository at (or containing) `repo`.
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }
}

impl ReleaseHistory for GitTagHistory {
    fn published_tags(&self) -> Result<Vec<String>, HistoryError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(["tag", "-l", "v*"])
            .output()?;

        if !output.status.success() {
            return Err(HistoryError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Fixed, in-memory history.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistory {
    tags: Vec<String>,
}

impl InMemoryHistory {
    /// History made of `tags`.
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

impl ReleaseHistory for InMemoryHistory {
    fn published_tags(&self) -> Result<Vec<String>, HistoryError> {
        Ok(self.tags.clone())
    }
}

/// Sort tags newest first by `(major, minor, patch, revision-or-0)`.
///
/// Tags that do not parse as versions go last, in their original order.
pub fn sort_tags(mut tags: Vec<String>) -> Vec<String> {
    tags.sort_by_cached_key(|tag| {
        std::cmp::Reverse(PackageVersion::from_tag(tag).ok())
    });
    tags
}

/// Computes next versions from a [`ReleaseHistory`].
#[derive(Debug, Clone)]
pub struct VersionResolver<H> {
    history: H,
}

impl<H: ReleaseHistory> VersionResolver<H> {
    /// Resolver over `history`.
    pub fn new(history: H) -> Self {
        Self { history }
    }

    /// Published tags, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read.
    pub fn tags(&self) -> Result<Vec<String>, HistoryError> {
        self.history.published_tags().map(sort_tags)
    }

    /// Published versions; an unreadable history counts as empty.
    fn published(&self) -> Vec<PackageVersion> {
        match self.history.published_tags() {
            Ok(tags) => tags
                .iter()
                .filter_map(|t| PackageVersion::from_tag(t).ok())
                .collect(),
            Err(e) => {
                tracing::warn!("Could not get git tags: {e}");
                Vec::new()
            }
        }
    }

    /// Highest published version sharing `base`, if any.
    pub fn latest_for_base(&self, base: &BaseVersion) -> Option<PackageVersion> {
        self.published()
            .into_iter()
            .filter(|v| v.base() == base)
            .max_by_key(PackageVersion::revision_or_zero)
    }

    /// The revision the next release of `base` needs, or `None` if `base`
    /// has never been published.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::RevisionOverflow`] if the highest published
    /// revision of `base` is `u32::MAX`.
    pub fn needed_revision(&self, base: &BaseVersion) -> Result<Option<u32>, VersionError> {
        self.latest_for_base(base)
            .map(|latest| latest.next_revision().map(|next| next.revision_or_zero()))
            .transpose()
    }

    /// Next version for `base`: the base itself when unpublished, otherwise
    /// the base with the highest published revision plus one.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::RevisionOverflow`] if no higher revision exists.
    pub fn next_version(&self, base: &BaseVersion) -> Result<PackageVersion, VersionError> {
        Ok(PackageVersion::new(base.clone(), self.needed_revision(base)?))
    }
}

/// Increment the revision of `current` without consulting any history.
///
/// # Errors
///
/// Returns [`VersionError::RevisionOverflow`] if the revision is `u32::MAX`.
pub fn bump_revision(current: &PackageVersion) -> Result<PackageVersion, VersionError> {
    current.next_revision()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(tags: &[&str]) -> VersionResolver<InMemoryHistory> {
        VersionResolver::new(InMemoryHistory::new(tags.iter().copied()))
    }

    fn base(s: &str) -> BaseVersion {
        s.parse().unwrap()
    }

    fn next(r: &VersionResolver<impl ReleaseHistory>, b: &str) -> String {
        r.next_version(&base(b)).unwrap().to_string()
    }

    struct BrokenHistory;

    impl ReleaseHistory for BrokenHistory {
        fn published_tags(&self) -> Result<Vec<String>, HistoryError> {
            Err(HistoryError::Failed {
                status: "exit status: 128".into(),
                stderr: "not a git repository".into(),
            })
        }
    }

    #[test]
    fn test_next_version_without_history() {
        assert_eq!(next(&resolver(&[]), "4.6.5"), "4.6.5");
    }

    #[test]
    fn test_next_version_sequence() {
        assert_eq!(next(&resolver(&["v4.6.5"]), "4.6.5"), "4.6.5.r1");
        assert_eq!(next(&resolver(&["v4.6.5", "v4.6.5.r1"]), "4.6.5"), "4.6.5.r2");
    }

    #[test]
    fn test_no_cross_base_leakage() {
        let r = resolver(&["v4.6.5", "v4.6.5.r1", "v4.6.5.r2"]);
        assert_eq!(next(&r, "4.6.6"), "4.6.6");
        assert_eq!(r.needed_revision(&base("4.6.6")), Ok(None));
        assert_eq!(r.needed_revision(&base("4.6.5")), Ok(Some(3)));
    }

    #[test]
    fn test_gaps_use_highest_revision() {
        let r = resolver(&["v4.6.5.r3", "v4.6.5", "junk", "v4.6.5.r1"]);
        assert_eq!(r.latest_for_base(&base("4.6.5")).unwrap().to_string(), "4.6.5.r3");
        assert_eq!(next(&r, "4.6.5"), "4.6.5.r4");
    }

    #[test]
    fn test_exhausted_revision_is_an_error() {
        let r = resolver(&["v4.6.5", "v4.6.5.r4294967295"]);
        let overflow = VersionError::RevisionOverflow("4.6.5.r4294967295".into());
        assert_eq!(r.needed_revision(&base("4.6.5")), Err(overflow.clone()));
        assert_eq!(r.next_version(&base("4.6.5")), Err(overflow));
        // other bases are unaffected
        assert_eq!(next(&r, "4.6.6"), "4.6.6");
    }

    #[test]
    fn test_broken_history_degrades_to_empty() {
        let r = VersionResolver::new(BrokenHistory);
        assert_eq!(next(&r, "1.0.0"), "1.0.0");
        assert!(r.tags().is_err());
    }

    #[test]
    fn test_sort_tags() {
        let sorted = sort_tags(
            ["v4.6.5", "nightly", "v4.10.0", "v4.6.5.r2", "v4.6.6"]
                .map(String::from)
                .to_vec(),
        );
        assert_eq!(sorted, ["v4.10.0", "v4.6.6", "v4.6.5.r2", "v4.6.5", "nightly"]);
    }

    #[test]
    fn test_bump_revision_ignores_history() {
        let current: PackageVersion = "4.6.5.r2".parse().unwrap();
        assert_eq!(bump_revision(&current).unwrap().to_string(), "4.6.5.r3");
        let plain: PackageVersion = "4.6.5".parse().unwrap();
        assert_eq!(bump_revision(&plain).unwrap().to_string(), "4.6.5.r1");
    }

    #[test]
    fn test_bump_revision_overflow() {
        let current: PackageVersion = "1.0.0.r4294967295".parse().unwrap();
        assert!(matches!(
            bump_revision(&current),
            Err(VersionError::RevisionOverflow(v)) if v == "1.0.0.r4294967295"
        ));
    }
}
