//! Line-ending normalization for packaged scripts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Result of normalizing a set of scripts.
#[derive(Debug, Default)]
pub struct Normalized {
    /// Display names of files that were rewritten.
    pub converted: Vec<String>,
    /// Display names of files that could not be processed, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Rewrite `path` with CRLF replaced by LF.
///
/// Returns `true` if the file contained CRLF and was rewritten.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written.
pub fn to_unix_line_endings(path: &Path) -> io::Result<bool> {
    let content = fs::read(path)?;
    if !content.windows(2).any(|w| w == b"\r\n") {
        return Ok(false);
    }
    fs::write(path, crlf_to_lf(&content))?;
    Ok(true)
}

/// Replace every CRLF pair with LF. Lone CR bytes are kept.
pub fn crlf_to_lf(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut iter = content.iter().peekable();
    while let Some(&byte) = iter.next() {
        if byte == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(byte);
    }
    out
}

/// Normalize `*.sh` and `*.py` in the control directory and `*.sh` in the
/// auxiliary scripts directory (if it exists).
///
/// Failures are collected rather than returned so one unreadable script
/// does not stop the rest.
pub fn normalize_scripts(control_dir: &Path, scripts_dir: &Path) -> Normalized {
    let mut outcome = Normalized::default();

    for path in files_with_extension(control_dir, &["sh", "py"]) {
        convert(&path, file_name(&path), &mut outcome);
    }

    if scripts_dir.is_dir() {
        for path in files_with_extension(scripts_dir, &["sh"]) {
            convert(&path, format!("scripts/{}", file_name(&path)), &mut outcome);
        }
    }

    outcome
}

fn convert(path: &Path, display: String, outcome: &mut Normalized) {
    match to_unix_line_endings(path) {
        Ok(true) => outcome.converted.push(display),
        Ok(false) => {}
        Err(e) => outcome.failed.push((display, e.to_string())),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Regular files directly inside `dir` with one of `extensions`, sorted.
fn files_with_extension(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| extensions.contains(&e))
        })
        .collect();
    files.sort();
    files
}
