use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::paths::sidecar_path;

/// Hex SHA-256 of a file, streamed in 64 KiB chunks.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Write `<artifact>.sha256` containing `<hex>  <file name>` (no newline).
///
/// Returns the sidecar path and the digest.
///
/// # Errors
///
/// Returns an error if the artifact cannot be hashed or the sidecar written.
pub fn write_sidecar(artifact: &Path) -> io::Result<(PathBuf, String)> {
    let digest = sha256_file(artifact)?;
    let name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let sidecar = sidecar_path(artifact);
    fs::write(&sidecar, format!("{digest}  {name}"))?;
    Ok((sidecar, digest))
}
