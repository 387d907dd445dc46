//! The ZIP envelope around the two inner archives.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};

use apkg_schema::ENVELOPE_ENTRIES;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Errors raised while writing or opening an envelope.
#[derive(thiserror::Error, Debug)]
pub enum EnvelopeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An entry would be written outside the destination root.
    #[error("Path traversal detected in ZIP: {entry}")]
    Traversal { entry: String },

    /// One or more of the fixed envelope entries is absent.
    #[error("Invalid APK format: missing required files ({})", .0.join(", "))]
    MissingEntries(Vec<String>),
}

/// Write the envelope at `dest` from the three entry files in `staging`.
///
/// Entries are deflated with a fixed 1980-01-01 timestamp, in the order
/// `apkg-version`, `control.tar.gz`, `data.tar.gz`.
///
/// # Errors
///
/// Returns [`EnvelopeError::MissingEntries`] before creating `dest` if any
/// entry file is absent from `staging`.
pub fn write_envelope(dest: &Path, staging: &Path) -> Result<(), EnvelopeError> {
    require_entries(staging)?;

    let mut zip = ZipWriter::new(BufWriter::new(File::create(dest)?));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    for name in ENVELOPE_ENTRIES {
        let mut source = File::open(staging.join(name))?;
        zip.start_file(name, options)?;
        io::copy(&mut source, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}

/// Resolve a ZIP entry name beneath `root` without touching the filesystem.
///
/// `.` segments are dropped and `..` segments pop a previous segment. The
/// name is rejected if it is absolute or climbs above `root`.
///
/// # Errors
///
/// Returns [`EnvelopeError::Traversal`] for names that escape `root`.
pub fn resolve_entry_path(root: &Path, name: &str) -> Result<PathBuf, EnvelopeError> {
    let traversal = || EnvelopeError::Traversal {
        entry: name.to_string(),
    };

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop().ok_or_else(traversal)?;
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }

    Ok(parts.iter().fold(root.to_path_buf(), |acc, p| acc.join(p)))
}

/// Extract every entry of the envelope at `src` into `dest`.
///
/// All entry names are resolved first; if any would escape `dest`, nothing
/// is written. Returns the entry names in archive order.
///
/// # Errors
///
/// Returns [`EnvelopeError::Traversal`] for an escaping entry, or an I/O or
/// ZIP error.
pub fn safe_unzip(src: &Path, dest: &Path) -> Result<Vec<String>, EnvelopeError> {
    let mut archive = ZipArchive::new(File::open(src)?)?;
    fs::create_dir_all(dest)?;

    let mut plan = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        let name = entry.name().to_string();
        let target = resolve_entry_path(dest, &name)?;
        plan.push((index, name, target, entry.is_dir()));
    }

    let mut names = Vec::with_capacity(plan.len());
    for (index, name, target, is_dir) in plan {
        if is_dir {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut entry = archive.by_index(index)?;
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
        }
        names.push(name);
    }

    Ok(names)
}

/// Check that the three envelope entries exist as files in `dir`.
///
/// # Errors
///
/// Returns [`EnvelopeError::MissingEntries`] naming every absent entry.
pub fn require_entries(dir: &Path) -> Result<(), EnvelopeError> {
    let missing: Vec<String> = ENVELOPE_ENTRIES
        .iter()
        .filter(|name| !dir.join(name).is_file())
        .map(|name| (*name).to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EnvelopeError::MissingEntries(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn staged() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("apkg-version"), "2.0\n").unwrap();
        fs::write(dir.path().join("control.tar.gz"), b"control").unwrap();
        fs::write(dir.path().join("data.tar.gz"), b"data").unwrap();
        dir
    }

    #[test]
    fn test_resolve_entry_path() {
        let root = Path::new("/dest");
        assert_eq!(
            resolve_entry_path(root, "a/./b/../c.txt").unwrap(),
            Path::new("/dest/a/c.txt")
        );
        assert!(resolve_entry_path(root, "../escape.txt").is_err());
        assert!(resolve_entry_path(root, "a/../../escape.txt").is_err());
        assert!(resolve_entry_path(root, "/etc/passwd").is_err());
    }

    #[test]
    fn test_write_then_unzip() {
        let staging = staged();
        let out = tempfile::tempdir().unwrap();
        let apk = out.path().join("pkg.apk");
        write_envelope(&apk, staging.path()).unwrap();

        let dest = out.path().join("x");
        let names = safe_unzip(&apk, &dest).unwrap();
        assert_eq!(names, ENVELOPE_ENTRIES);
        assert_eq!(fs::read_to_string(dest.join("apkg-version")).unwrap(), "2.0\n");
        require_entries(&dest).unwrap();
    }

    #[test]
    fn test_envelope_is_reproducible() {
        let staging = staged();
        let out = tempfile::tempdir().unwrap();
        write_envelope(&out.path().join("a.apk"), staging.path()).unwrap();
        write_envelope(&out.path().join("b.apk"), staging.path()).unwrap();
        assert_eq!(
            fs::read(out.path().join("a.apk")).unwrap(),
            fs::read(out.path().join("b.apk")).unwrap()
        );
    }

    #[test]
    fn test_write_requires_all_entries() {
        let staging = staged();
        fs::remove_file(staging.path().join("data.tar.gz")).unwrap();
        let out = tempfile::tempdir().unwrap();
        let apk = out.path().join("pkg.apk");

        let err = write_envelope(&apk, staging.path()).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingEntries(ref m) if m == &["data.tar.gz"]));
        assert!(!apk.exists());
    }

    #[test]
    fn test_traversal_rejected_before_any_write() {
        let out = tempfile::tempdir().unwrap();
        let apk = out.path().join("evil.apk");
        zip_with(
            &apk,
            &[("apkg-version", b"2.0\n".as_slice()), ("../escape.txt", b"gotcha".as_slice())],
        );

        let dest = out.path().join("dest");
        let err = safe_unzip(&apk, &dest).unwrap_err();
        assert!(matches!(err, EnvelopeError::Traversal { ref entry } if entry == "../escape.txt"));
        assert!(!out.path().join("escape.txt").exists());
        assert!(!dest.join("apkg-version").exists());
    }

    #[test]
    fn test_absolute_entry_rejected() {
        let out = tempfile::tempdir().unwrap();
        let apk = out.path().join("evil.apk");
        let outside = out.path().join("outside.txt");
        let name = outside.to_string_lossy().into_owned();
        zip_with(&apk, &[(name.as_str(), b"gotcha".as_slice())]);

        let err = safe_unzip(&apk, &out.path().join("dest")).unwrap_err();
        assert!(matches!(err, EnvelopeError::Traversal { .. }));
        assert!(!outside.exists());
    }

    #[test]
    fn test_require_entries_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("apkg-version"), "2.0\n").unwrap();
        let err = require_entries(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            EnvelopeError::MissingEntries(ref m) if m == &["control.tar.gz", "data.tar.gz"]
        ));
    }
}
