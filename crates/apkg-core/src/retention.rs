//! Pruning of superseded artifacts in an output directory.
//!
//! Artifacts are matched on their exact `<package>_<version>_<arch>.apk`
//! name: a different package whose id merely starts with the same text
//! (`io.app` vs `io.app2`) is never touched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use apkg_schema::version::is_pre_release;
use apkg_schema::{APK_EXTENSION, Arch};
use glob::Pattern;

use crate::paths::sidecar_path;

/// The version embedded in an artifact file name, if the name belongs to
/// `package` built for `arch`.
pub fn artifact_version<'a>(file_name: &'a str, package: &str, arch: Arch) -> Option<&'a str> {
    let rest = file_name.strip_prefix(package)?.strip_prefix('_')?;
    let version = rest
        .strip_suffix(APK_EXTENSION)?
        .strip_suffix('.')?
        .strip_suffix(arch.as_str())?
        .strip_suffix('_')?;
    (!version.is_empty() && !version.contains('_')).then_some(version)
}

/// Artifacts of `package`/`arch` in `dir`, with their versions.
fn artifacts(dir: &Path, package: &str, arch: Arch) -> io::Result<Vec<(PathBuf, String)>> {
    let pattern = format!(
        "{}/{}_*_{}.{APK_EXTENSION}",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(package),
        arch
    );
    let paths = glob::glob(&pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut found = Vec::new();
    for path in paths {
        let path = path.map_err(glob::GlobError::into_error)?;
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(version) = artifact_version(name, package, arch) {
            let version = version.to_string();
            found.push((path, version));
        }
    }
    found.sort();
    Ok(found)
}

fn remove_with_sidecar(path: &Path) -> io::Result<()> {
    fs::remove_file(path)?;
    let sidecar = sidecar_path(path);
    if sidecar.exists() {
        fs::remove_file(sidecar)?;
    }
    Ok(())
}

/// Remove every production artifact of `package`/`arch` whose version is not
/// `current`. Pre-release artifacts are left alone.
///
/// Returns the removed artifact paths.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or a file removed.
pub fn prune_releases(
    dir: &Path,
    package: &str,
    arch: Arch,
    current: &str,
) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for (path, version) in artifacts(dir, package, arch)? {
        if is_pre_release(&version) || version == current {
            continue;
        }
        remove_with_sidecar(&path)?;
        tracing::debug!("pruned release {}", path.display());
        removed.push(path);
    }
    Ok(removed)
}

/// Keep the `keep` most recently modified pre-release artifacts of
/// `package`/`arch` and remove the rest. The newest artifact is always
/// kept, even when `keep` is zero.
///
/// Returns the removed artifact paths.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or a file removed.
pub fn prune_dev_builds(
    dir: &Path,
    package: &str,
    arch: Arch,
    keep: usize,
) -> io::Result<Vec<PathBuf>> {
    let mut builds: Vec<(SystemTime, PathBuf)> = Vec::new();
    for (path, version) in artifacts(dir, package, arch)? {
        if !is_pre_release(&version) {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        builds.push((modified, path));
    }

    // newest first; name breaks ties
    builds.sort_by(|a, b| b.cmp(a));

    let mut removed = Vec::new();
    for (_, path) in builds.into_iter().skip(keep.max(1)) {
        remove_with_sidecar(&path)?;
        tracing::debug!("pruned dev build {}", path.display());
        removed.push(path);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, name).unwrap();
        path
    }

    fn touch_at(dir: &Path, name: &str, secs: u64) -> PathBuf {
        let path = touch(dir, name);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
        path
    }

    #[test]
    fn test_artifact_version() {
        assert_eq!(
            artifact_version("io.app_1.2.3.r1_x86-64.apk", "io.app", Arch::X86_64),
            Some("1.2.3.r1")
        );
        assert_eq!(artifact_version("io.app2_1.2.3_x86-64.apk", "io.app", Arch::X86_64), None);
        assert_eq!(artifact_version("io.app_1.2.3_arm64.apk", "io.app", Arch::X86_64), None);
        assert_eq!(artifact_version("io.app__x86-64.apk", "io.app", Arch::X86_64), None);
        assert_eq!(artifact_version("io.app_x_1.0_any.apk", "io.app", Arch::Any), None);
    }

    #[test]
    fn test_prune_releases_keeps_current_and_others() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let old = touch(d, "io.app_1.0.0_x86-64.apk");
        let old_sum = touch(d, "io.app_1.0.0_x86-64.apk.sha256");
        let current = touch(d, "io.app_1.0.0.r1_x86-64.apk");
        let dev = touch(d, "io.app_1.0.0.dev3_x86-64.apk");
        let other_arch = touch(d, "io.app_0.9.0_arm64.apk");
        let prefix_sibling = touch(d, "io.app2_0.1.0_x86-64.apk");

        let removed = prune_releases(d, "io.app", Arch::X86_64, "1.0.0.r1").unwrap();

        assert_eq!(removed, [old.clone()]);
        assert!(!old.exists());
        assert!(!old_sum.exists());
        for kept in [current, dev, other_arch, prefix_sibling] {
            assert!(kept.exists(), "{} was removed", kept.display());
        }
    }

    #[test]
    fn test_prune_dev_builds_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let mut paths = Vec::new();
        for n in 1..=7u64 {
            paths.push(touch_at(d, &format!("io.app_1.0.0.dev{n}_any.apk"), 1_000 + n));
        }
        let release = touch_at(d, "io.app_1.0.0_any.apk", 1);

        let removed = prune_dev_builds(d, "io.app", Arch::Any, 5).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(!paths[0].exists());
        assert!(!paths[1].exists());
        assert!(paths[2..].iter().all(|p| p.exists()));
        assert!(release.exists());
    }

    #[test]
    fn test_prune_dev_builds_never_removes_newest() {
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        let older = touch_at(d, "io.app_1.0.0.dev1_any.apk", 1_000);
        let newest = touch_at(d, "io.app_1.0.0.dev2_any.apk", 2_000);

        let removed = prune_dev_builds(d, "io.app", Arch::Any, 0).unwrap();

        assert_eq!(removed, [older]);
        assert!(newest.exists());
    }

    #[test]
    fn test_prune_in_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(prune_releases(&missing, "io.app", Arch::Any, "1.0.0").unwrap().is_empty());
        assert!(prune_dev_builds(&missing, "io.app", Arch::Any, 5).unwrap().is_empty());
    }
}
