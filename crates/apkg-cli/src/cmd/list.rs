//! `apkg list`

use std::path::Path;

use anyhow::{Context, Result};
use apkg_core::{PackageReader, Reporter};

use crate::ui::theme::format_size;
use crate::ui::{Output, list};

/// Print the identity and contents of `apk`.
pub fn list(apk: &Path, verbose: bool) -> Result<()> {
    let output = Output::new();
    let listing = PackageReader::new(&output)
        .list(apk)
        .with_context(|| format!("Failed to read {}", apk.display()))?;

    let name = apk
        .file_name()
        .map_or_else(|| apk.display().to_string(), |n| n.to_string_lossy().into_owned());
    output.section(&format!("{name} ({})", format_size(listing.size)));
    output.field("APK Version", &listing.format_version);

    let info = &listing.info;
    output.section("Package");
    output.field("Name", &info.name);
    output.field("Version", &info.version);
    output.field("Architecture", &info.architecture);
    output.field("Firmware", info.firmware.as_deref().unwrap_or("unknown"));

    output.section("CONTROL");
    list::print_entries_header(true);
    for entry in &listing.control {
        list::print_entry(entry, true);
    }
    list::print_entries_footer(&listing.control);

    output.section("DATA");
    list::print_entries_header(verbose);
    for entry in &listing.data {
        list::print_entry(entry, verbose);
    }
    list::print_entries_footer(&listing.data);

    Ok(())
}
