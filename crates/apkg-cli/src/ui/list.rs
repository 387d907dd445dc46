//! Archive listing output for `apkg list`

use apkg_core::archive::ArchiveEntry;
use crossterm::style::Stylize;

use super::theme::{Theme, format_mode, format_size};

/// Print column headers for an entry listing
pub fn print_entries_header(with_meta: bool) {
    let theme = Theme::default();
    let header = if with_meta {
        format!(
            "  {:<mw$} {:>sw$}   {}",
            "mode",
            "size",
            "path",
            mw = theme.mode_width,
            sw = theme.size_width,
        )
    } else {
        "  path".to_string()
    };
    println!("{}", header.dark_grey());
}

/// Print one archive entry, with or without mode and size columns
pub fn print_entry(entry: &ArchiveEntry, with_meta: bool) {
    let theme = Theme::default();
    let path = entry.path.trim_start_matches("./");

    if with_meta {
        let mode = format!("{:<width$}", format_mode(entry.mode), width = theme.mode_width);
        let size = format!("{:>width$}", format_size(entry.size), width = theme.size_width);
        println!("  {} {}   {path}", mode.dark_grey(), size.dark_grey());
    } else {
        println!("  {path}");
    }
}

/// Print the file count and total size below a listing
pub fn print_entries_footer(entries: &[ArchiveEntry]) {
    let total: u64 = entries.iter().map(|e| e.size).sum();
    let msg = format!("  {} files, {}", entries.len(), format_size(total));
    println!("{}", msg.dark_grey());
}
