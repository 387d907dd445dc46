//! Package version identifiers with revision suffixes.
//!
//! A package version is the upstream application version (`X.Y.Z`, the
//! *base*) optionally followed by a package revision (`.rN`). The revision
//! distinguishes repeated releases of an unchanged upstream version:
//!
//! - first release of `4.6.5`: `4.6.5`
//! - package-only change on the same base: `4.6.5.r1`, then `4.6.5.r2`
//! - new upstream version: `4.6.6` (the revision sequence restarts)
//!
//! A revision of zero is the same identifier as no revision at all, so
//! [`PackageVersion::new`] folds `Some(0)` into `None`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

/// Marker token carried by pre-release (dev) build versions, e.g. `4.6.5.dev3`.
pub const PRE_RELEASE_MARKER: &str = ".dev";

static BASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").expect("valid base regex"));

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+\.\d+\.\d+)(?:\.r(\d+))?$").expect("valid version regex")
});

/// Errors produced when parsing version strings.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The string is not `X.Y.Z` or `X.Y.Z.rN`.
    #[error("Invalid version format: {0} (expected X.Y.Z or X.Y.Z.rN)")]
    InvalidVersion(String),

    /// The string is not a plain `X.Y.Z` base version.
    #[error("Invalid base version format: {0} (expected X.Y.Z, e.g. 4.6.5)")]
    InvalidBase(String),

    /// The revision of this version is already the largest representable.
    #[error("Revision overflow: {0} has no next revision")]
    RevisionOverflow(String),
}

/// The three-component upstream version, without any revision suffix.
///
/// Equality is textual (`4.6.5` and `04.6.5` are different bases, matching
/// how tags are compared); ordering is numeric.
#[derive(Debug, Clone)]
pub struct BaseVersion {
    text: String,
    parts: [u64; 3],
}

impl BaseVersion {
    /// Numeric `(major, minor, patch)` components.
    pub fn parts(&self) -> [u64; 3] {
        self.parts
    }

    /// The base exactly as written.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for BaseVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = BASE_RE
            .captures(s)
            .ok_or_else(|| VersionError::InvalidBase(s.to_string()))?;

        let mut parts = [0u64; 3];
        for (slot, idx) in parts.iter_mut().zip(1..=3) {
            *slot = caps[idx]
                .parse()
                .map_err(|_| VersionError::InvalidBase(s.to_string()))?;
        }

        Ok(Self {
            text: s.to_string(),
            parts,
        })
    }
}

impl fmt::Display for BaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq for BaseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for BaseVersion {}

impl Hash for BaseVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl Ord for BaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts
            .cmp(&other.parts)
            .then_with(|| self.text.cmp(&other.text))
    }
}

impl PartialOrd for BaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A released package version: base plus optional revision.
///
/// # Example
///
/// ```
/// use apkg_schema::PackageVersion;
///
/// let v: PackageVersion = "4.6.5.r2".parse().unwrap();
/// assert_eq!(v.base().as_str(), "4.6.5");
/// assert_eq!(v.revision(), Some(2));
/// assert_eq!(v.next_revision().unwrap().to_string(), "4.6.5.r3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageVersion {
    base: BaseVersion,
    revision: Option<u32>,
}

impl PackageVersion {
    /// Combine a base and a revision. `Some(0)` is stored as `None`.
    pub fn new(base: BaseVersion, revision: Option<u32>) -> Self {
        Self {
            base,
            revision: revision.filter(|r| *r != 0),
        }
    }

    /// Parse a release tag such as `v4.6.5.r1`; the leading `v` is optional.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidVersion`] if the remainder is not a
    /// valid version.
    pub fn from_tag(tag: &str) -> Result<Self, VersionError> {
        tag.strip_prefix('v').unwrap_or(tag).parse()
    }

    /// The base version.
    pub fn base(&self) -> &BaseVersion {
        &self.base
    }

    /// The revision, or `None` for a first release of the base.
    pub fn revision(&self) -> Option<u32> {
        self.revision
    }

    /// The revision with an absent revision counted as zero.
    pub fn revision_or_zero(&self) -> u32 {
        self.revision.unwrap_or(0)
    }

    /// Same base, revision incremented by one.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::RevisionOverflow`] if the revision is already
    /// `u32::MAX`.
    pub fn next_revision(&self) -> Result<Self, VersionError> {
        let revision = self
            .revision_or_zero()
            .checked_add(1)
            .ok_or_else(|| VersionError::RevisionOverflow(self.to_string()))?;
        Ok(Self::new(self.base.clone(), Some(revision)))
    }
}

impl FromStr for PackageVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VersionError::InvalidVersion(s.to_string());
        let caps = VERSION_RE.captures(s).ok_or_else(invalid)?;

        let base: BaseVersion = caps[1].parse().map_err(|_| invalid())?;
        let revision = match caps.get(2) {
            Some(m) => Some(m.as_str().parse::<u32>().map_err(|_| invalid())?),
            None => None,
        };

        Ok(Self::new(base, revision))
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision {
            Some(rev) => write!(f, "{}.r{rev}", self.base),
            None => write!(f, "{}", self.base),
        }
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base
            .parts
            .cmp(&other.base.parts)
            .then_with(|| self.revision_or_zero().cmp(&other.revision_or_zero()))
            .then_with(|| self.base.text.cmp(&other.base.text))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Version string for the `build`-th pre-release of `version`.
pub fn pre_release_version(version: &str, build: u32) -> String {
    format!("{version}{PRE_RELEASE_MARKER}{build}")
}

/// Whether a version string denotes a pre-release build.
pub fn is_pre_release(version: &str) -> bool {
    version.contains(PRE_RELEASE_MARKER)
}
