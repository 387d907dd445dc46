//! `apkg extract`

use std::path::Path;

use anyhow::{Context, Result};
use apkg_core::{PackageReader, ReadError, Reporter};

use crate::ui::Output;

/// Unpack `apk` beneath `destination`.
pub fn extract(apk: &Path, destination: &Path, force: bool) -> Result<()> {
    let output = Output::new();
    let reader = PackageReader::new(&output);

    match reader.extract(apk, destination, force) {
        Ok(dir) => {
            output.success(&format!("Extracted to: {}", dir.display()));
            Ok(())
        }
        Err(ReadError::DestinationExists(dir)) => {
            output.info("Use --force to overwrite");
            anyhow::bail!("Destination already exists: {}", dir.display())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to extract {}", apk.display())),
    }
}
