//! Persisted pre-release build counter.
//!
//! The record lives in a small text file as `<version>:<counter>`, e.g.
//! `4.6.5.r2:3`. The counter restarts at 1 whenever the package version
//! changes or the record cannot be read.

use std::fs;
use std::io;
use std::path::Path;

/// The stored `{version, counter}` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevCounter {
    /// Package version the counter belongs to.
    pub version: String,
    /// Number of the last pre-release built for that version.
    pub counter: u32,
}

impl DevCounter {
    /// Parse `<version>:<counter>`. Anything else yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let (version, counter) = text.trim().split_once(':')?;
        Some(Self {
            version: version.to_string(),
            counter: counter.trim().parse().ok()?,
        })
    }

    /// Read the record at `path`, if present and well-formed.
    pub fn load(path: &Path) -> Option<Self> {
        fs::read_to_string(path).ok().as_deref().and_then(Self::parse)
    }

    /// Serialized form.
    pub fn to_record(&self) -> String {
        format!("{}:{}", self.version, self.counter)
    }
}

/// Outcome of [`next_dev_build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevBuild {
    /// The pre-release number to use.
    pub number: u32,
    /// Version stored previously, when it differs from the current one.
    pub reset_from: Option<String>,
}

/// Advance the counter for `version` and persist it at `path`.
///
/// # Errors
///
/// Returns an error if the record cannot be written.
pub fn next_dev_build(path: &Path, version: &str) -> io::Result<DevBuild> {
    let previous = DevCounter::load(path);

    let (number, reset_from) = match previous {
        Some(prev) if prev.version == version => (prev.counter.saturating_add(1), None),
        Some(prev) => (1, Some(prev.version)),
        None => (1, None),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let record = DevCounter {
        version: version.to_string(),
        counter: number,
    };
    fs::write(path, record.to_record())?;
    tracing::debug!("dev build counter now {}", record.to_record());

    Ok(DevBuild { number, reset_from })
}
