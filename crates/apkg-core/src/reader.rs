//! Inspect and unpack built packages.
//!
//! Both operations open the envelope into a private `APKG-*` scratch
//! directory through [`envelope::safe_unzip`], so an entry that would land
//! outside the scratch root aborts the read before anything is written.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use apkg_schema::{CONTROL_DIR, CONTROL_ENTRY, DATA_ENTRY, MANIFEST_FILE, Manifest, VERSION_ENTRY};
use tempfile::TempDir;

use crate::archive::{self, ArchiveEntry, ArchiveError};
use crate::envelope::{self, EnvelopeError};
use crate::reporter::Reporter;

const UNKNOWN: &str = "unknown";
const UNKNOWN_VERSION: &str = "0.0.0";

/// Errors raised while reading a package.
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error("APK file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The extraction target exists and overwriting was not requested.
    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Identity declared by the manifest inside a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Display name (`general.name`).
    pub name: String,
    /// `general.version`
    pub version: String,
    /// `general.architecture`
    pub architecture: String,
    /// `general.firmware`, when declared.
    pub firmware: Option<String>,
}

impl Default for PackageInfo {
    fn default() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            version: UNKNOWN_VERSION.to_string(),
            architecture: UNKNOWN.to_string(),
            firmware: None,
        }
    }
}

impl PackageInfo {
    /// Identity from a manifest, with defaults for anything absent.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let field = |value: Option<&str>, default: &str| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };
        Self {
            name: field(manifest.name(), UNKNOWN),
            version: field(manifest.version(), UNKNOWN_VERSION),
            architecture: field(manifest.architecture(), UNKNOWN),
            firmware: manifest.firmware().map(str::to_string),
        }
    }

    /// Output directory name: `<name>_<version>_<arch>`, with path
    /// separators replaced by `_`.
    pub fn dir_name(&self) -> String {
        format!("{}_{}_{}", self.name, self.version, self.architecture)
            .replace(['/', '\\'], "_")
    }
}

/// Everything [`PackageReader::list`] reports about a package.
#[derive(Debug, Clone)]
pub struct Listing {
    /// Contents of `apkg-version`, trimmed.
    pub format_version: String,
    /// Manifest identity.
    pub info: PackageInfo,
    /// Regular files of `control.tar.gz`.
    pub control: Vec<ArchiveEntry>,
    /// Regular files of `data.tar.gz`.
    pub data: Vec<ArchiveEntry>,
    /// Size of the envelope in bytes.
    pub size: u64,
}

/// An envelope opened into a scratch directory that is removed on drop.
struct Opened {
    scratch: TempDir,
}

impl Opened {
    fn open(apk: &Path, prefix: &str) -> Result<Self, ReadError> {
        if !apk.is_file() {
            return Err(ReadError::NotFound(apk.to_path_buf()));
        }
        let scratch = tempfile::Builder::new().prefix(prefix).tempdir()?;
        envelope::safe_unzip(apk, scratch.path())?;
        envelope::require_entries(scratch.path())?;
        Ok(Self { scratch })
    }

    fn entry(&self, name: &str) -> PathBuf {
        self.scratch.path().join(name)
    }

    fn format_version(&self) -> io::Result<String> {
        Ok(fs::read_to_string(self.entry(VERSION_ENTRY))?.trim().to_string())
    }

    /// Identity from the packaged manifest; an absent or unparseable
    /// manifest yields the defaults.
    fn info(&self) -> Result<PackageInfo, ReadError> {
        let Some(bytes) = archive::read_entry(&self.entry(CONTROL_ENTRY), MANIFEST_FILE)? else {
            tracing::warn!("package has no {MANIFEST_FILE}");
            return Ok(PackageInfo::default());
        };
        match Manifest::from_json(&String::from_utf8_lossy(&bytes)) {
            Ok(manifest) => Ok(PackageInfo::from_manifest(&manifest)),
            Err(e) => {
                tracing::warn!("unreadable {MANIFEST_FILE} in package: {e}");
                Ok(PackageInfo::default())
            }
        }
    }
}

fn files_only(entries: Vec<ArchiveEntry>) -> Vec<ArchiveEntry> {
    entries.into_iter().filter(|e| !e.is_dir).collect()
}

/// Reads packages, reporting progress to a [`Reporter`].
pub struct PackageReader<'a> {
    reporter: &'a dyn Reporter,
}

impl std::fmt::Debug for PackageReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageReader").finish_non_exhaustive()
    }
}

impl<'a> PackageReader<'a> {
    /// New reader.
    pub fn new(reporter: &'a dyn Reporter) -> Self {
        Self { reporter }
    }

    /// Describe the package at `apk` without writing outside a scratch area.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, is not a valid envelope, or
    /// an inner archive is unreadable.
    pub fn list(&self, apk: &Path) -> Result<Listing, ReadError> {
        let opened = Opened::open(apk, "APKG-List-")?;

        Ok(Listing {
            format_version: opened.format_version()?,
            info: opened.info()?,
            control: files_only(archive::list_tar_gz(&opened.entry(CONTROL_ENTRY))?),
            data: files_only(archive::list_tar_gz(&opened.entry(DATA_ENTRY))?),
            size: fs::metadata(apk)?.len(),
        })
    }

    /// Unpack the package at `apk` into `<dest_root>/<name>_<version>_<arch>`,
    /// with the control set under `CONTROL/`.
    ///
    /// An existing output directory is replaced when `force` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::DestinationExists`] when the output directory
    /// exists and `force` is not set, or any envelope, archive or I/O error.
    pub fn extract(&self, apk: &Path, dest_root: &Path, force: bool) -> Result<PathBuf, ReadError> {
        let opened = Opened::open(apk, "APKG-Extract-")?;
        let info = opened.info()?;
        let output = dest_root.join(info.dir_name());

        if output.exists() {
            if !force {
                return Err(ReadError::DestinationExists(output));
            }
            self.reporter.warning(&format!(
                "Overwriting existing directory: {}",
                output.display()
            ));
            fs::remove_dir_all(&output)?;
        }

        self.reporter.section(&format!("Extracting {}", info.name));
        fs::create_dir_all(&output)?;
        archive::unpack_tar_gz(&opened.entry(DATA_ENTRY), &output)?;
        self.reporter.success(&format!("Extracted {DATA_ENTRY}"));

        let control = output.join(CONTROL_DIR);
        fs::create_dir_all(&control)?;
        archive::unpack_tar_gz(&opened.entry(CONTROL_ENTRY), &control)?;
        self.reporter.success(&format!("Extracted {CONTROL_ENTRY}"));

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use crate::builder::tests::scaffold;
    use crate::builder::{BuildRequest, PackageBuilder};
    use crate::reporter::{NullReporter, RecordingReporter};
    use crate::settings::BuildSettings;

    fn built_package(root: &Path) -> PathBuf {
        let layout = scaffold(root);
        PackageBuilder::new(BuildSettings::default(), &NullReporter)
            .build(&BuildRequest::new(layout))
            .unwrap()
            .artifact
    }

    fn zip_with(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(fs::File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_list() {
        let root = tempfile::tempdir().unwrap();
        let apk = built_package(root.path());

        let listing = PackageReader::new(&NullReporter).list(&apk).unwrap();
        assert_eq!(listing.format_version, "2.0");
        assert_eq!(listing.info.name, "Runtipi");
        assert_eq!(listing.info.version, "4.6.5");
        assert_eq!(listing.info.architecture, "x86-64");
        assert_eq!(listing.info.firmware.as_deref(), Some("4.1.0"));
        assert_eq!(listing.size, fs::metadata(&apk).unwrap().len());

        let data: Vec<&str> = listing.data.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(data, ["./www/index.html"]);
        let script = listing
            .control
            .iter()
            .find(|e| e.path == "./start-stop.sh")
            .unwrap();
        assert_eq!(script.mode, 0o755);
    }

    #[test]
    fn test_extract_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let apk = built_package(root.path());
        let dest = tempfile::tempdir().unwrap();

        let out = PackageReader::new(&NullReporter)
            .extract(&apk, dest.path(), false)
            .unwrap();

        assert_eq!(out, dest.path().join("Runtipi_4.6.5_x86-64"));
        assert_eq!(fs::read(out.join("www/index.html")).unwrap(), b"<html/>");
        assert_eq!(
            fs::read(out.join("CONTROL/config.json")).unwrap(),
            fs::read(root.path().join("apk/CONTROL/config.json")).unwrap()
        );
        assert!(out.join("CONTROL/changelog.txt").is_file());
        assert!(!out.join("bin").exists());
    }

    #[test]
    fn test_extract_conflict_and_force() {
        let root = tempfile::tempdir().unwrap();
        let apk = built_package(root.path());
        let dest = tempfile::tempdir().unwrap();
        let existing = dest.path().join("Runtipi_4.6.5_x86-64");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join("stale.txt"), b"stale").unwrap();

        let err = PackageReader::new(&NullReporter)
            .extract(&apk, dest.path(), false)
            .unwrap_err();
        assert!(matches!(err, ReadError::DestinationExists(ref p) if *p == existing));
        assert!(existing.join("stale.txt").exists());

        let reporter = RecordingReporter::default();
        PackageReader::new(&reporter)
            .extract(&apk, dest.path(), true)
            .unwrap();
        assert!(!existing.join("stale.txt").exists());
        assert!(existing.join("www/index.html").is_file());
        assert_eq!(reporter.warnings().len(), 1);
    }

    #[test]
    fn test_missing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("broken.apk");
        zip_with(&apk, &[("apkg-version", b"2.0\n".as_slice())]);

        let err = PackageReader::new(&NullReporter).list(&apk).unwrap_err();
        match err {
            ReadError::Envelope(EnvelopeError::MissingEntries(missing)) => {
                assert_eq!(missing, ["control.tar.gz", "data.tar.gz"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_traversal_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("evil.apk");
        zip_with(
            &apk,
            &[
                ("apkg-version", b"2.0\n".as_slice()),
                ("../escape.txt", b"gotcha".as_slice()),
            ],
        );
        let dest = dir.path().join("out");

        let err = PackageReader::new(&NullReporter)
            .extract(&apk, &dest, false)
            .unwrap_err();
        assert!(matches!(
            err,
            ReadError::Envelope(EnvelopeError::Traversal { .. })
        ));
        assert!(!dir.path().join("escape.txt").exists());
        assert!(!dest.exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PackageReader::new(&NullReporter)
            .list(&dir.path().join("nope.apk"))
            .unwrap_err();
        assert!(matches!(err, ReadError::NotFound(_)));
    }

    #[test]
    fn test_info_defaults_and_dir_name() {
        assert_eq!(PackageInfo::default().dir_name(), "unknown_0.0.0_unknown");

        let manifest =
            Manifest::from_json(r#"{"general": {"name": "a/b\\c", "version": "1.0.0"}}"#).unwrap();
        let info = PackageInfo::from_manifest(&manifest);
        assert_eq!(info.dir_name(), "a_b_c_1.0.0_unknown");
        assert_eq!(info.firmware, None);
    }
}
