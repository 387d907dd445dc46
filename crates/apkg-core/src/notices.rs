//! Changelog and license files copied into the control set.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Name of the changelog inside the control directory.
pub const CHANGELOG_FILE: &str = "changelog.txt";

/// Name of the license inside the control directory.
pub const LICENSE_FILE: &str = "license.txt";

static COPYRIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Copyright \(c\) \d{4}").expect("valid copyright regex"));

/// What happened to the license during a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseCopy {
    /// No source license exists.
    Missing,
    /// Copied as-is.
    Copied,
    /// Copied, and the copyright year in the source was updated too.
    YearUpdated(i32),
}

/// Copy the changelog into `control_dir` with LF newlines.
///
/// Returns `false` when `source` does not exist.
///
/// # Errors
///
/// Returns an error if the changelog cannot be read or written.
pub fn copy_changelog(source: &Path, control_dir: &Path) -> io::Result<bool> {
    if !source.is_file() {
        return Ok(false);
    }
    let content = fs::read_to_string(source)?.replace("\r\n", "\n");
    fs::write(control_dir.join(CHANGELOG_FILE), content)?;
    Ok(true)
}

/// Copy the license into `control_dir`, rewriting `Copyright (c) YYYY` to
/// `year`.
///
/// When the rewrite changes anything, the source license is updated as well.
///
/// # Errors
///
/// Returns an error if the license cannot be read or written.
pub fn copy_license(source: &Path, control_dir: &Path, year: i32) -> io::Result<LicenseCopy> {
    if !source.is_file() {
        return Ok(LicenseCopy::Missing);
    }

    let original = fs::read_to_string(source)?.replace("\r\n", "\n");
    let updated = COPYRIGHT_RE
        .replace_all(&original, format!("Copyright (c) {year}").as_str())
        .into_owned();

    fs::write(control_dir.join(LICENSE_FILE), &updated)?;

    if updated == original {
        Ok(LicenseCopy::Copied)
    } else {
        fs::write(source, &updated)?;
        Ok(LicenseCopy::YearUpdated(year))
    }
}

/// The current calendar year in local time.
pub fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Local::now().year()
}
