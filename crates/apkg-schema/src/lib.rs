//! Shared types for APK package tooling.
//!
//! An APK is a ZIP envelope holding three entries: a format marker
//! (`apkg-version`), the control archive (`control.tar.gz`) and the payload
//! archive (`data.tar.gz`). This crate holds the types both the builder and
//! the reader agree on.

pub mod arch;
pub mod manifest;
pub mod model;
pub mod version;

// Re-exports
pub use arch::*;
pub use manifest::{Manifest, ManifestError, PackageIdentity, REQUIRED_FIELDS};
pub use model::{ARM64_MODELS, VALID_MODELS};
pub use version::{BaseVersion, PackageVersion, VersionError};

/// Envelope format version written into the `apkg-version` entry.
pub const APKG_FORMAT_VERSION: &str = "2.0";

/// Name of the envelope entry holding the format marker.
pub const VERSION_ENTRY: &str = "apkg-version";

/// Name of the envelope entry holding the control archive.
pub const CONTROL_ENTRY: &str = "control.tar.gz";

/// Name of the envelope entry holding the payload archive.
pub const DATA_ENTRY: &str = "data.tar.gz";

/// The three entries every envelope must contain.
pub const ENVELOPE_ENTRIES: [&str; 3] = [VERSION_ENTRY, CONTROL_ENTRY, DATA_ENTRY];

/// File extension of built packages.
pub const APK_EXTENSION: &str = "apk";

/// Suffix appended after the artifact extension for checksum sidecars.
pub const CHECKSUM_SUFFIX: &str = "sha256";

/// Name of the control directory inside the package root and inside
/// extracted packages.
pub const CONTROL_DIR: &str = "CONTROL";

/// Name of the manifest file inside the control directory.
pub const MANIFEST_FILE: &str = "config.json";
