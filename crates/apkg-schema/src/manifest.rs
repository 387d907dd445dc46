//! The package manifest (`CONTROL/config.json`).
//!
//! The manifest is kept as a raw JSON document rather than a typed struct:
//! validation must be able to report *which* required field is missing or
//! empty, and rewrites (version or architecture overrides) must preserve
//! every key the tool does not know about, in its original order.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::arch::Arch;

/// Fields that must be present and non-empty in the `general` section.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "package",
    "name",
    "version",
    "developer",
    "maintainer",
    "email",
    "website",
    "architecture",
    "firmware",
];

/// Errors that can occur while reading or rewriting a manifest.
#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    /// The manifest file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The manifest is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The top-level JSON value is not an object.
    #[error("Manifest must be a JSON object")]
    NotAnObject,

    /// The `general` section is absent or not an object.
    #[error("Manifest has no `general` section")]
    MissingGeneral,

    /// A field needed to identify the package is missing or unusable.
    #[error("Invalid manifest field `{field}`: {reason}")]
    Field {
        /// Name of the offending field inside `general`.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// A package manifest document.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    doc: Value,
}

/// The identity triple that names an artifact: `<package>_<version>_<arch>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    /// Package identifier (`general.package`), e.g. `io.runtipi`.
    pub package: String,
    /// Version string as written in the manifest.
    pub version: String,
    /// Target architecture.
    pub arch: Arch,
}

impl PackageIdentity {
    /// Artifact file stem: `<package>_<version>_<arch>`.
    pub fn artifact_stem(&self) -> String {
        format!("{}_{}_{}", self.package, self.version, self.arch)
    }

    /// Artifact file name including the `.apk` extension.
    pub fn artifact_file_name(&self) -> String {
        format!("{}.{}", self.artifact_stem(), crate::APK_EXTENSION)
    }
}

impl Manifest {
    /// Parse a manifest from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Json`] for malformed JSON and
    /// [`ManifestError::NotAnObject`] if the document is not an object.
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        let doc: Value = serde_json::from_str(text)?;
        if !doc.is_object() {
            return Err(ManifestError::NotAnObject);
        }
        Ok(Self { doc })
    }

    /// Read and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON object.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// The `general` section, if present.
    pub fn general(&self) -> Option<&Map<String, Value>> {
        self.doc.get("general")?.as_object()
    }

    fn general_mut(&mut self) -> Result<&mut Map<String, Value>, ManifestError> {
        self.doc
            .get_mut("general")
            .and_then(Value::as_object_mut)
            .ok_or(ManifestError::MissingGeneral)
    }

    /// A string field of the `general` section.
    ///
    /// Returns `None` when the field is missing or is not a string.
    pub fn general_str(&self, field: &str) -> Option<&str> {
        self.general()?.get(field)?.as_str()
    }

    /// `general.package`
    pub fn package(&self) -> Option<&str> {
        self.general_str("package")
    }

    /// `general.name`
    pub fn name(&self) -> Option<&str> {
        self.general_str("name")
    }

    /// `general.version`
    pub fn version(&self) -> Option<&str> {
        self.general_str("version")
    }

    /// `general.architecture`
    pub fn architecture(&self) -> Option<&str> {
        self.general_str("architecture")
    }

    /// `general.firmware`
    pub fn firmware(&self) -> Option<&str> {
        self.general_str("firmware")
    }

    /// Raw `general.model` value (usually a list of model codes).
    pub fn models(&self) -> Option<&Value> {
        self.general()?.get("model")
    }

    /// Overwrite `general.version`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::MissingGeneral`] if there is no `general` section.
    pub fn set_version(&mut self, version: &str) -> Result<(), ManifestError> {
        self.general_mut()?
            .insert("version".to_string(), Value::String(version.to_string()));
        Ok(())
    }

    /// Overwrite `general.architecture`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::MissingGeneral`] if there is no `general` section.
    pub fn set_architecture(&mut self, arch: Arch) -> Result<(), ManifestError> {
        self.general_mut()?.insert(
            "architecture".to_string(),
            Value::String(arch.as_str().to_string()),
        );
        Ok(())
    }

    /// Overwrite `general.model` with a list of model codes.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::MissingGeneral`] if there is no `general` section.
    pub fn set_models(&mut self, models: &[&str]) -> Result<(), ManifestError> {
        let list = models
            .iter()
            .map(|m| Value::String((*m).to_string()))
            .collect();
        self.general_mut()?
            .insert("model".to_string(), Value::Array(list));
        Ok(())
    }

    /// Extract the artifact identity.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Field`] if `package`, `version` or
    /// `architecture` is missing, empty, or (for the architecture) not one of
    /// the accepted values.
    pub fn identity(&self) -> Result<PackageIdentity, ManifestError> {
        let required = |field: &'static str| {
            self.general_str(field)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or(ManifestError::Field {
                    field,
                    reason: "missing or empty".to_string(),
                })
        };

        let package = required("package")?.to_string();
        let version = required("version")?.to_string();
        let arch = required("architecture")?
            .parse::<Arch>()
            .map_err(|reason| ManifestError::Field {
                field: "architecture",
                reason,
            })?;

        Ok(PackageIdentity {
            package,
            version,
            arch,
        })
    }

    /// Serialize with 4-space indentation, keeping key order.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Json`] if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String, ManifestError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.doc.serialize(&mut ser)?;
        // serde_json only emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write the manifest to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        fs::write(path, self.to_pretty_json()?)?;
        Ok(())
    }
}

/// Rewrite only `general.version` of the manifest at `path`.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read, parsed, or written.
pub fn update_version_in_file(path: &Path, version: &str) -> Result<(), ManifestError> {
    let mut manifest = Manifest::load(path)?;
    manifest.set_version(version)?;
    manifest.save(path)
}
