//! End-to-end tests driving the `apkg` binary against a temporary project.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const MANIFEST: &str = r#"{
    "general": {
        "package": "io.example.app",
        "name": "Example",
        "version": "1.2.3",
        "developer": "Example",
        "maintainer": "someone",
        "email": "dev@example.com",
        "website": "https://example.com",
        "architecture": "x86-64",
        "firmware": "4.0.0"
    }
}"#;

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes
}

fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let control = dir.path().join("apk/CONTROL");
    fs::create_dir_all(&control).unwrap();
    fs::create_dir_all(dir.path().join("apk/www")).unwrap();
    fs::write(control.join("config.json"), MANIFEST).unwrap();
    fs::write(control.join("icon.png"), png(90, 90)).unwrap();
    fs::write(control.join("start-stop.sh"), "#!/bin/sh\nexit 0\n").unwrap();
    fs::write(dir.path().join("apk/www/index.html"), "<html/>").unwrap();
    dir
}

fn apkg(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_apkg"))
        .arg("--root")
        .arg(root)
        .args(args)
        .env_remove("APKG_ROOT")
        .env_remove("APKG_MAX_DEV_BUILDS")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run apkg")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_build_list_extract() {
    let dir = project();
    let root = dir.path();

    let out = apkg(root, &["build"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let apk = root.join("releases/io.example.app_1.2.3_x86-64.apk");
    assert!(apk.is_file());
    assert!(root.join("releases/io.example.app_1.2.3_x86-64.apk.sha256").is_file());

    let out = apkg(root, &["list", apk.to_str().unwrap()]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("Example"));
    assert!(text.contains("config.json"));
    assert!(text.contains("www/index.html"));

    let dest = root.join("out");
    let out = apkg(
        root,
        &["extract", apk.to_str().unwrap(), "-d", dest.to_str().unwrap()],
    );
    assert!(out.status.success());
    let extracted = dest.join("Example_1.2.3_x86-64");
    assert_eq!(
        fs::read_to_string(extracted.join("www/index.html")).unwrap(),
        "<html/>"
    );
    assert!(extracted.join("CONTROL/config.json").is_file());

    // second extract needs --force
    let out = apkg(
        root,
        &["extract", apk.to_str().unwrap(), "-d", dest.to_str().unwrap()],
    );
    assert!(!out.status.success());
    let out = apkg(
        root,
        &[
            "extract",
            apk.to_str().unwrap(),
            "-d",
            dest.to_str().unwrap(),
            "--force",
        ],
    );
    assert!(out.status.success());
}

#[test]
fn test_invalid_manifest_fails_without_artifact() {
    let dir = project();
    let root = dir.path();
    let manifest = root.join("apk/CONTROL/config.json");
    let broken = MANIFEST.replace("\"firmware\": \"4.0.0\"", "\"firmware\": \"\"");
    fs::write(&manifest, &broken).unwrap();

    let out = apkg(root, &["build", "--dev"]);
    assert!(!out.status.success());
    assert!(!root.join("releases/dev").exists());
    assert_eq!(fs::read_to_string(&manifest).unwrap(), broken);
}

#[test]
fn test_dev_builds_keep_manifest() {
    let dir = project();
    let root = dir.path();
    let manifest = root.join("apk/CONTROL/config.json");

    for _ in 0..2 {
        let out = apkg(root, &["build", "--dev"]);
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    }

    let dev = root.join("releases/dev");
    assert!(dev.join("io.example.app_1.2.3.dev1_x86-64.apk").is_file());
    assert!(dev.join("io.example.app_1.2.3.dev2_x86-64.apk").is_file());
    assert!(!dev.join("io.example.app_1.2.3.dev2_x86-64.apk.sha256").exists());
    assert_eq!(fs::read_to_string(&manifest).unwrap(), MANIFEST);
    assert_eq!(
        fs::read_to_string(root.join("build/.dev-build-counter")).unwrap(),
        "1.2.3:2"
    );
}

#[test]
fn test_zero_dev_retention_is_rejected() {
    let dir = project();
    let root = dir.path();

    let out = apkg(root, &["build", "--dev", "--max-dev-builds", "0"]);
    assert!(!out.status.success());
    assert!(!root.join("releases/dev").exists());

    let out = apkg(root, &["build", "--dev", "--max-dev-builds", "1"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(root.join("releases/dev/io.example.app_1.2.3.dev1_x86-64.apk").is_file());
}

#[test]
fn test_check_command() {
    let dir = project();
    assert!(apkg(dir.path(), &["check"]).status.success());

    fs::remove_file(dir.path().join("apk/CONTROL/icon.png")).unwrap();
    assert!(!apkg(dir.path(), &["check"]).status.success());
}

#[test]
fn test_version_commands() {
    let dir = project();
    let root = dir.path();

    let out = apkg(root, &["version", "--quiet", "current"]);
    assert_eq!(stdout(&out).trim(), "1.2.3");

    // no tag history: the base is new
    let out = apkg(root, &["version", "--quiet", "next", "--base", "2.0.0"]);
    assert_eq!(stdout(&out).trim(), "2.0.0");

    let out = apkg(root, &["version", "--quiet", "bump-revision"]);
    assert_eq!(stdout(&out).trim(), "1.2.3.r1");

    let out = apkg(root, &["version", "--quiet", "set", "2.0.0"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "2.0.0");

    let out = apkg(root, &["version", "--quiet", "current"]);
    assert_eq!(stdout(&out).trim(), "2.0.0");

    let out = apkg(root, &["version", "set", "2.0"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Invalid base version format: 2.0"));
}

#[test]
fn test_bump_revision_at_limit_fails() {
    let dir = project();
    let root = dir.path();
    let manifest = root.join("apk/CONTROL/config.json");
    let exhausted = MANIFEST.replace("\"1.2.3\"", "\"1.2.3.r4294967295\"");
    fs::write(&manifest, &exhausted).unwrap();

    let out = apkg(root, &["version", "--quiet", "bump-revision"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Revision overflow"));
    assert_eq!(fs::read_to_string(&manifest).unwrap(), exhausted);
}
