//! Control file set and manifest validation.
//!
//! Validation never mutates anything and never prints. It returns a
//! [`ValidationReport`], an ordered list of findings, and leaves it to the
//! caller to decide how findings are shown and which exit status they map to.
//! Only structural problems (missing control files, missing or empty required
//! fields, a bad package id or architecture) are fatal. Everything else is an
//! advisory.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::LazyLock;

use apkg_schema::{Arch, MANIFEST_FILE, Manifest, REQUIRED_FIELDS, model::is_known_model};
use regex::Regex;

/// Control files that must exist.
pub const REQUIRED_CONTROL_FILES: [&str; 2] = [MANIFEST_FILE, "icon.png"];

/// Control files whose absence is only reported.
pub const OPTIONAL_CONTROL_FILES: [&str; 11] = [
    "start-stop.sh",
    "pre-install.sh",
    "post-install.sh",
    "pre-uninstall.sh",
    "post-uninstall.sh",
    "pre-snapshot-restore.sh",
    "post-snapshot-restore.sh",
    "changelog.txt",
    "description.json",
    "description.txt",
    "license.txt",
];

/// Icon edge length the firmware requires inside a package.
pub const ICON_REQUIRED_SIZE: u32 = 90;

/// Icon edge length used for store listings (accepted, with a warning).
pub const ICON_DEVELOPER_CORNER_SIZE: u32 = 256;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Bytes inspected for CRLF line endings.
const CRLF_PROBE_LEN: u64 = 4096;

static PACKAGE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9.+-]+$").expect("valid package id regex"));

static MANIFEST_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+){1,3}(\.r\d+)?$").expect("valid version regex"));

static FIRMWARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+(\.\d+)?$").expect("valid firmware regex"));

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Reported, build proceeds.
    Warning,
    /// Build must not proceed.
    Fatal,
}

/// Machine-readable category of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingCode {
    /// The control directory itself does not exist.
    MissingControlDir,
    /// A required control file is absent.
    MissingRequiredFile,
    /// An optional control file is absent.
    OptionalFileMissing,
    /// Icon width and height differ.
    IconNotSquare,
    /// Icon is the 256x256 store-listing size instead of 90x90.
    IconDeveloperCornerSize,
    /// Icon is square but not 90x90.
    IconSize,
    /// A control script does not start with `#!`.
    MissingShebang,
    /// A control script has CRLF line endings.
    CrlfLineEndings,
    /// The manifest has no `general` section.
    MissingGeneralSection,
    /// A required manifest field is absent (or not a string).
    MissingField,
    /// A required manifest field is blank.
    EmptyField,
    /// The package id uses characters outside `[a-zA-Z0-9.+-]`.
    InvalidPackageId,
    /// The architecture is not one of the accepted values.
    InvalidArchitecture,
    /// The version does not look like `X.Y.Z[.W][.rN]`.
    VersionFormat,
    /// The firmware does not look like `X.Y[.Z]`.
    FirmwareFormat,
    /// A model code is not in the known set.
    UnknownModel,
}

/// A single validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Fatal or advisory.
    pub severity: Severity,
    /// Category.
    pub code: FindingCode,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Ordered collection of findings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    findings: Vec<Finding>,
}

impl ValidationReport {
    /// Empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fatal finding.
    pub fn fatal(&mut self, code: FindingCode, message: impl Into<String>) {
        self.findings.push(Finding {
            severity: Severity::Fatal,
            code,
            message: message.into(),
        });
    }

    /// Record an advisory finding.
    pub fn warn(&mut self, code: FindingCode, message: impl Into<String>) {
        self.findings.push(Finding {
            severity: Severity::Warning,
            code,
            message: message.into(),
        });
    }

    /// Append every finding of `other`, keeping order.
    pub fn merge(&mut self, other: ValidationReport) {
        self.findings.extend(other.findings);
    }

    /// True when no fatal finding was recorded.
    pub fn passed(&self) -> bool {
        !self.findings.iter().any(|f| f.severity == Severity::Fatal)
    }

    /// All findings in the order they were recorded.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Fatal findings only.
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Fatal)
    }

    /// Advisory findings only.
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    /// Whether any finding carries `code`.
    pub fn has(&self, code: FindingCode) -> bool {
        self.findings.iter().any(|f| f.code == code)
    }
}

/// Check the control directory's structure.
///
/// Missing required files are fatal. Optional files, the icon size, script
/// shebangs and CRLF line endings only produce warnings.
pub fn validate_control_dir(control_dir: &Path) -> ValidationReport {
    let mut report = ValidationReport::new();

    if !control_dir.is_dir() {
        report.fatal(
            FindingCode::MissingControlDir,
            format!("CONTROL folder not found: {}", control_dir.display()),
        );
        return report;
    }

    for name in REQUIRED_CONTROL_FILES {
        if !control_dir.join(name).is_file() {
            report.fatal(
                FindingCode::MissingRequiredFile,
                format!("Required file not found: CONTROL/{name}"),
            );
        }
    }

    for name in OPTIONAL_CONTROL_FILES {
        if !control_dir.join(name).is_file() {
            report.warn(
                FindingCode::OptionalFileMissing,
                format!("Optional file missing: CONTROL/{name}"),
            );
        }
    }

    let icon = control_dir.join("icon.png");
    if icon.is_file() {
        match png_dimensions(&icon) {
            Ok(Some((width, height))) => check_icon_size(&mut report, width, height),
            Ok(None) => tracing::debug!("icon.png has no PNG signature, size not checked"),
            Err(e) => tracing::debug!("could not read icon.png: {e}"),
        }
    }

    for script in control_scripts(control_dir) {
        let name = script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !has_shebang(&script) {
            report.warn(
                FindingCode::MissingShebang,
                format!("Script missing shebang: {name}"),
            );
        }
        if has_crlf(&script) {
            report.warn(
                FindingCode::CrlfLineEndings,
                format!("Script has Windows line endings (CRLF): {name} (will be converted)"),
            );
        }
    }

    report
}

fn check_icon_size(report: &mut ValidationReport, width: u32, height: u32) {
    if width != height {
        report.warn(
            FindingCode::IconNotSquare,
            format!("Icon should be square: {width}x{height}"),
        );
    } else if width == ICON_DEVELOPER_CORNER_SIZE {
        report.warn(
            FindingCode::IconDeveloperCornerSize,
            format!(
                "Icon is {width}x{height} (256x256 is for Developer Corner, APK requires 90x90)"
            ),
        );
    } else if width != ICON_REQUIRED_SIZE {
        report.warn(
            FindingCode::IconSize,
            format!("Icon size: {width}x{height} (ASUSTOR requires exactly 90x90 for APK package)"),
        );
    }
}

/// `*.sh` files directly inside the control directory, sorted by name.
fn control_scripts(control_dir: &Path) -> Vec<std::path::PathBuf> {
    let Ok(entries) = std::fs::read_dir(control_dir) else {
        return Vec::new();
    };
    let mut scripts: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "sh"))
        .collect();
    scripts.sort();
    scripts
}

/// Read PNG width and height from the first 24 bytes.
///
/// Returns `Ok(None)` when the file is shorter than a PNG header or does not
/// carry the PNG signature.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn png_dimensions(path: &Path) -> io::Result<Option<(u32, u32)>> {
    let mut header = Vec::with_capacity(24);
    File::open(path)?.take(24).read_to_end(&mut header)?;

    if header.len() < 24 || header[..8] != PNG_SIGNATURE {
        return Ok(None);
    }

    let width = u32::from_be_bytes([header[16], header[17], header[18], header[19]]);
    let height = u32::from_be_bytes([header[20], header[21], header[22], header[23]]);
    Ok(Some((width, height)))
}

fn has_shebang(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut first_line = Vec::new();
    if BufReader::new(file)
        .read_until(b'\n', &mut first_line)
        .is_err()
    {
        return false;
    }
    first_line.starts_with(b"#!")
}

fn has_crlf(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut head = Vec::new();
    if file.take(CRLF_PROBE_LEN).read_to_end(&mut head).is_err() {
        return false;
    }
    head.windows(2).any(|w| w == b"\r\n")
}

/// Check the manifest's `general` section.
///
/// Every problem is recorded; validation does not stop at the first fatal
/// finding. Format checks on `version` and `firmware` and unknown model
/// codes are warnings.
pub fn validate_manifest(manifest: &Manifest) -> ValidationReport {
    let mut report = ValidationReport::new();

    let Some(general) = manifest.general() else {
        report.fatal(
            FindingCode::MissingGeneralSection,
            "Missing required section: general",
        );
        return report;
    };

    for field in REQUIRED_FIELDS {
        match general.get(field).and_then(|v| v.as_str()) {
            None => report.fatal(
                FindingCode::MissingField,
                format!("Missing required field: {field}"),
            ),
            Some(value) if value.trim().is_empty() => report.fatal(
                FindingCode::EmptyField,
                format!("Empty required field: {field}"),
            ),
            Some(_) => {}
        }
    }

    if let Some(package) = non_blank(manifest.package()).filter(|p| !PACKAGE_ID_RE.is_match(p)) {
        report.fatal(
            FindingCode::InvalidPackageId,
            format!("Invalid package name: {package} (valid characters: [a-zA-Z0-9.+-])"),
        );
    }

    if let Some(arch) = non_blank(manifest.architecture()).filter(|a| a.parse::<Arch>().is_err()) {
        let valid: Vec<&str> = Arch::ALL.iter().map(Arch::as_str).collect();
        report.fatal(
            FindingCode::InvalidArchitecture,
            format!("Invalid architecture: {arch} (valid: {})", valid.join(", ")),
        );
    }

    if let Some(version) =
        non_blank(manifest.version()).filter(|v| !MANIFEST_VERSION_RE.is_match(v))
    {
        report.warn(
            FindingCode::VersionFormat,
            format!("Version '{version}' may not follow semantic versioning (X.Y.Z)"),
        );
    }

    if let Some(firmware) = non_blank(manifest.firmware()).filter(|f| !FIRMWARE_RE.is_match(f)) {
        report.warn(
            FindingCode::FirmwareFormat,
            format!("Firmware '{firmware}' format may be invalid (expected: X.Y or X.Y.Z)"),
        );
    }

    if let Some(models) = manifest.models().and_then(|m| m.as_array()) {
        for model in models {
            let code = model.as_str().map_or_else(|| model.to_string(), str::to_string);
            if !is_known_model(&code) {
                report.warn(
                    FindingCode::UnknownModel,
                    format!(
                        "Unknown model: {code} (valid: {})",
                        apkg_schema::VALID_MODELS.join(", ")
                    ),
                );
            }
        }
    }

    report
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
