//! Icons and formatting helpers shared by the terminal output.

/// Status icons
#[derive(Debug, Clone)]
pub struct Icons {
    pub success: &'static str,
    pub warning: &'static str,
    pub error: &'static str,
    pub info: &'static str,
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub icons: Icons,
    /// Width of the mode column in listings
    pub mode_width: usize,
    /// Width of the size column in listings
    pub size_width: usize,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            icons: Icons {
                success: "✓",
                warning: "!",
                error: "✗",
                info: "•",
            },
            mode_width: 6,
            size_width: 10,
        }
    }
}

/// Human-readable size: bytes below 1 KiB, then KB with one decimal.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Permission bits as zero-padded octal (`0755`).
pub fn format_mode(mode: u32) -> String {
    format!("{:04o}", mode & 0o7777)
}
