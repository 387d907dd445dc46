use std::path::{Path, PathBuf};

use apkg_schema::{CONTROL_DIR, MANIFEST_FILE};

/// Fixed layout of an apkg project, relative to its root.
///
/// ```text
/// <root>/
///   apk/                      package root (payload)
///     CONTROL/config.json     control set + manifest
///     bin/                    binary staging, never packaged as payload
///   scripts/                  auxiliary scripts (line endings normalized)
///   CHANGELOG.md, LICENSE
///   releases/                 production artifacts
///     dev/                    pre-release artifacts
///   build/.dev-build-counter
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout rooted at `APKG_ROOT`, or the current directory.
    pub fn from_env() -> Self {
        let root = std::env::var_os("APKG_ROOT").map_or_else(|| PathBuf::from("."), PathBuf::from);
        Self::new(root)
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Package root: `<root>/apk`
    pub fn package_dir(&self) -> PathBuf {
        self.root.join("apk")
    }

    /// Control file set: `<root>/apk/CONTROL`
    pub fn control_dir(&self) -> PathBuf {
        self.package_dir().join(CONTROL_DIR)
    }

    /// Manifest: `<root>/apk/CONTROL/config.json`
    pub fn manifest_path(&self) -> PathBuf {
        self.control_dir().join(MANIFEST_FILE)
    }

    /// Binary staging folder: `<root>/apk/bin`
    pub fn bin_dir(&self) -> PathBuf {
        self.package_dir().join("bin")
    }

    /// Auxiliary scripts: `<root>/scripts`
    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    /// Changelog source: `<root>/CHANGELOG.md`
    pub fn changelog_path(&self) -> PathBuf {
        self.root.join("CHANGELOG.md")
    }

    /// License source: `<root>/LICENSE`
    pub fn license_path(&self) -> PathBuf {
        self.root.join("LICENSE")
    }

    /// Production output: `<root>/releases`
    pub fn releases_dir(&self) -> PathBuf {
        self.root.join("releases")
    }

    /// Pre-release output: `<root>/releases/dev`
    pub fn dev_releases_dir(&self) -> PathBuf {
        self.releases_dir().join("dev")
    }

    /// Scratch directory for persisted build state: `<root>/build`
    pub fn build_dir(&self) -> PathBuf {
        self.root.join("build")
    }

    /// Pre-release counter record: `<root>/build/.dev-build-counter`
    pub fn dev_counter_path(&self) -> PathBuf {
        self.build_dir().join(".dev-build-counter")
    }
}

/// Checksum sidecar path for an artifact: `<artifact>.sha256`.
pub fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(".");
    name.push(apkg_schema::CHECKSUM_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = ProjectLayout::new("/proj");
        assert_eq!(layout.manifest_path(), Path::new("/proj/apk/CONTROL/config.json"));
        assert_eq!(layout.bin_dir(), Path::new("/proj/apk/bin"));
        assert_eq!(layout.dev_releases_dir(), Path::new("/proj/releases/dev"));
        assert_eq!(layout.dev_counter_path(), Path::new("/proj/build/.dev-build-counter"));
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("releases/io.app_1.0.0_x86-64.apk")),
            Path::new("releases/io.app_1.0.0_x86-64.apk.sha256")
        );
    }
}
