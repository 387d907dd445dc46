//! Package assembly.
//!
//! [`PackageBuilder::build`] runs the whole pipeline for one artifact:
//!
//! 1. validate the control set and the manifest (fatal findings abort
//!    before anything is written)
//! 2. apply manifest overrides under a [`ManifestGuard`]
//! 3. copy the changelog and license into the control set
//! 4. normalize script line endings
//! 5. write `apkg-version`, `control.tar.gz` and `data.tar.gz` into a
//!    private `APKG-*` workspace
//! 6. wrap them in the ZIP envelope
//! 7. production: checksum sidecar + prune superseded releases;
//!    pre-release: prune beyond the retention count
//!
//! The workspace and the manifest guard are scoped values, so the manifest
//! is restored and the workspace removed on every exit path, including
//! errors and panics that unwind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use apkg_schema::version::pre_release_version;
use apkg_schema::{
    APKG_FORMAT_VERSION, Arch, CONTROL_DIR, CONTROL_ENTRY, DATA_ENTRY, Manifest, ManifestError,
    PackageIdentity, VERSION_ENTRY,
};

use crate::archive::{self, ArchiveError};
use crate::checksum;
use crate::dev_counter::{self, DevBuild};
use crate::envelope::{self, EnvelopeError};
use crate::notices::{self, LicenseCopy};
use crate::paths::ProjectLayout;
use crate::reporter::Reporter;
use crate::retention;
use crate::settings::BuildSettings;
use crate::text;
use crate::validate::{self, FindingCode, Severity, ValidationReport};

/// Name of the binary staging folder excluded from the payload.
pub const BIN_DIR: &str = "bin";

/// Errors that abort a build.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// Validation produced at least one fatal finding.
    #[error("Package validation failed: {}", summarize(.0))]
    Validation(ValidationReport),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn summarize(report: &ValidationReport) -> String {
    let errors: Vec<&str> = report.errors().map(|f| f.message.as_str()).collect();
    errors.join("; ")
}

/// Production releases or numbered pre-releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseKind {
    /// Published artifact: gets a checksum, supersedes older releases.
    #[default]
    Production,
    /// Local pre-release: no checksum, bounded retention.
    PreRelease,
}

/// Transient manifest rewrites applied for the duration of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestOverrides {
    /// Replace `general.version`.
    pub version: Option<String>,
    /// Replace `general.architecture` (and the model filter for ARM64).
    pub arch: Option<Arch>,
}

impl ManifestOverrides {
    fn is_empty(&self) -> bool {
        self.version.is_none() && self.arch.is_none()
    }
}

/// Everything a build needs to know.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Project whose `apk/` tree is packaged.
    pub layout: ProjectLayout,
    /// Output directory; defaults to `releases/` or `releases/dev/`.
    pub destination: Option<PathBuf>,
    /// Production or pre-release.
    pub kind: ReleaseKind,
    /// Manifest overrides.
    pub overrides: ManifestOverrides,
}

impl BuildRequest {
    /// Production build of `layout` with default output.
    pub fn new(layout: ProjectLayout) -> Self {
        Self {
            layout,
            destination: None,
            kind: ReleaseKind::Production,
            overrides: ManifestOverrides::default(),
        }
    }

    fn output_dir(&self) -> PathBuf {
        match (&self.destination, self.kind) {
            (Some(dir), _) => dir.clone(),
            (None, ReleaseKind::Production) => self.layout.releases_dir(),
            (None, ReleaseKind::PreRelease) => self.layout.dev_releases_dir(),
        }
    }
}

/// What a successful build produced.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Path of the written artifact.
    pub artifact: PathBuf,
    /// Identity the artifact was built with (after overrides).
    pub identity: PackageIdentity,
    /// Size of the artifact in bytes.
    pub size: u64,
    /// SHA-256 of the artifact (production builds only).
    pub checksum: Option<String>,
    /// Artifacts removed by pruning.
    pub pruned: Vec<PathBuf>,
    /// All validation findings (warnings only, since the build succeeded).
    pub report: ValidationReport,
}

/// Scoped manifest stash.
///
/// Captures the manifest bytes on creation and writes them back when
/// dropped, whether the build succeeded or not.
#[derive(Debug)]
pub struct ManifestGuard {
    path: PathBuf,
    original: Vec<u8>,
}

impl ManifestGuard {
    /// Capture the current bytes of the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read.
    pub fn stash(path: &Path) -> io::Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            original: fs::read(path)?,
        })
    }
}

impl Drop for ManifestGuard {
    fn drop(&mut self) {
        match fs::write(&self.path, &self.original) {
            Ok(()) => tracing::debug!("restored {}", self.path.display()),
            Err(e) => tracing::error!("failed to restore {}: {e}", self.path.display()),
        }
    }
}

/// Assembles packages, reporting progress to a [`Reporter`].
pub struct PackageBuilder<'a> {
    settings: BuildSettings,
    reporter: &'a dyn Reporter,
}

impl std::fmt::Debug for PackageBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageBuilder")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<'a> PackageBuilder<'a> {
    /// New builder with the given settings.
    pub fn new(settings: BuildSettings, reporter: &'a dyn Reporter) -> Self {
        Self { settings, reporter }
    }

    /// Validate the control set and manifest and report every finding,
    /// without touching anything.
    ///
    /// # Errors
    ///
    /// Returns a manifest error if `config.json` exists but cannot be parsed.
    pub fn validate(&self, layout: &ProjectLayout) -> Result<ValidationReport, BuildError> {
        self.reporter.section("Validating package");
        let mut report = validate::validate_control_dir(&layout.control_dir());
        if report.passed() {
            let manifest = Manifest::load(&layout.manifest_path())?;
            report.merge(validate::validate_manifest(&manifest));
        }
        self.report_findings(&report);
        Ok(report)
    }

    /// Build one artifact.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Validation`] before writing anything if a fatal
    /// finding exists; otherwise any I/O, archive or envelope failure.
    pub fn build(&self, request: &BuildRequest) -> Result<BuildOutcome, BuildError> {
        let layout = &request.layout;
        let manifest_path = layout.manifest_path();

        let report = self.validate(layout)?;
        if !report.passed() {
            return Err(BuildError::Validation(report));
        }

        let mut manifest = Manifest::load(&manifest_path)?;
        let mut identity = manifest.identity()?;

        // restored on drop, after the workspace below is removed
        let _guard = if request.overrides.is_empty() {
            None
        } else {
            let guard = ManifestGuard::stash(&manifest_path)?;
            self.apply_overrides(&mut manifest, &mut identity, &request.overrides)?;
            manifest.save(&manifest_path)?;
            Some(guard)
        };

        self.reporter.info(&format!("Package: {}", identity.package));
        self.reporter.info(&format!("Version: {}", identity.version));
        self.reporter.info(&format!("Architecture: {}", identity.arch));

        let output_dir = request.output_dir();
        fs::create_dir_all(&output_dir)?;
        let artifact = output_dir.join(identity.artifact_file_name());

        let workspace = tempfile::Builder::new().prefix("APKG-").tempdir()?;
        tracing::debug!("workspace {}", workspace.path().display());

        self.copy_notices(layout)?;
        self.normalize_line_endings(layout);

        self.reporter.section("Creating archives");
        self.write_archives(layout, workspace.path())?;

        self.reporter.section("Creating APK package");
        if artifact.exists() {
            fs::remove_file(&artifact)?;
        }
        if let Err(e) = envelope::write_envelope(&artifact, workspace.path()) {
            let _ = fs::remove_file(&artifact);
            return Err(e.into());
        }
        let size = fs::metadata(&artifact)?.len();

        let (checksum, pruned) = match request.kind {
            ReleaseKind::Production => {
                let (_, digest) = checksum::write_sidecar(&artifact)?;
                let pruned = retention::prune_releases(
                    &output_dir,
                    &identity.package,
                    identity.arch,
                    &identity.version,
                )?;
                (Some(digest), pruned)
            }
            ReleaseKind::PreRelease => {
                let pruned = retention::prune_dev_builds(
                    &output_dir,
                    &identity.package,
                    identity.arch,
                    self.settings.max_dev_builds,
                )?;
                (None, pruned)
            }
        };
        let label = match request.kind {
            ReleaseKind::Production => "release",
            ReleaseKind::PreRelease => "dev build",
        };
        for path in &pruned {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            self.reporter.info(&format!("Removed old {label}: {name}"));
        }

        self.reporter
            .success(&format!("Package created: {}", artifact.display()));

        Ok(BuildOutcome {
            artifact,
            identity,
            size,
            checksum,
            pruned,
            report,
        })
    }

    fn report_findings(&self, report: &ValidationReport) {
        for finding in report.findings() {
            match (finding.severity, finding.code) {
                (Severity::Fatal, _) => self.reporter.error(&finding.message),
                (Severity::Warning, FindingCode::OptionalFileMissing) => {
                    self.reporter.detail(&finding.message);
                }
                (Severity::Warning, _) => self.reporter.warning(&finding.message),
            }
        }
    }

    fn apply_overrides(
        &self,
        manifest: &mut Manifest,
        identity: &mut PackageIdentity,
        overrides: &ManifestOverrides,
    ) -> Result<(), ManifestError> {
        if let Some(arch) = overrides.arch {
            if arch == identity.arch {
                self.reporter
                    .warning(&format!("Manifest already targets {arch}, nothing to switch"));
            } else {
                manifest.set_architecture(arch)?;
                let models = arch.model_filter();
                if !models.is_empty() {
                    manifest.set_models(models)?;
                    self.reporter
                        .info(&format!("Model filter: {}", models.join(", ")));
                }
                identity.arch = arch;
            }
        }

        if let Some(version) = &overrides.version {
            manifest.set_version(version)?;
            identity.version.clone_from(version);
        }

        Ok(())
    }

    fn copy_notices(&self, layout: &ProjectLayout) -> io::Result<()> {
        let control = layout.control_dir();

        if notices::copy_changelog(&layout.changelog_path(), &control)? {
            self.reporter.success("Changelog copied to APK");
        } else {
            self.reporter.warning("CHANGELOG.md not found, skipping");
        }

        match notices::copy_license(&layout.license_path(), &control, notices::current_year())? {
            LicenseCopy::Missing => self.reporter.warning("LICENSE file not found, skipping"),
            LicenseCopy::Copied => {}
            LicenseCopy::YearUpdated(year) => self
                .reporter
                .info(&format!("Updated copyright year to {year}")),
        }
        Ok(())
    }

    fn normalize_line_endings(&self, layout: &ProjectLayout) {
        let outcome = text::normalize_scripts(&layout.control_dir(), &layout.scripts_dir());
        for name in &outcome.converted {
            self.reporter.detail(&format!("Converted to LF: {name}"));
        }
        for (name, reason) in &outcome.failed {
            self.reporter
                .warning(&format!("Could not convert {name}: {reason}"));
        }
    }

    fn write_archives(&self, layout: &ProjectLayout, workspace: &Path) -> Result<(), BuildError> {
        let mtime = self.settings.source_date_epoch;

        fs::write(
            workspace.join(VERSION_ENTRY),
            format!("{APKG_FORMAT_VERSION}\n"),
        )?;
        self.reporter.success(&format!("Created {VERSION_ENTRY}"));

        let count = archive::create_tar_gz(
            &workspace.join(CONTROL_ENTRY),
            &layout.control_dir(),
            &[],
            mtime,
        )?;
        self.reporter
            .success(&format!("Created {CONTROL_ENTRY} ({count} entries)"));

        let count = archive::create_tar_gz(
            &workspace.join(DATA_ENTRY),
            &layout.package_dir(),
            &[CONTROL_DIR, BIN_DIR],
            mtime,
        )?;
        self.reporter
            .success(&format!("Created {DATA_ENTRY} ({count} entries)"));

        Ok(())
    }
}

/// Advance the pre-release counter and return the version to build with
/// (`<manifest version>.dev<N>`).
///
/// # Errors
///
/// Returns an error if the manifest cannot be read, has no version, or the
/// counter record cannot be written.
pub fn next_pre_release(layout: &ProjectLayout) -> Result<(String, DevBuild), BuildError> {
    let manifest = Manifest::load(&layout.manifest_path())?;
    let version = manifest
        .version()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ManifestError::Field {
            field: "version",
            reason: "missing or empty".to_string(),
        })?
        .to_string();

    let build = dev_counter::next_dev_build(&layout.dev_counter_path(), &version)?;
    Ok((pre_release_version(&version, build.number), build))
}
