//! Line-oriented terminal reporter.
//!
//! Progress and results go to stdout; warnings and errors go to stderr so
//! `--quiet` output stays clean for scripts.

use apkg_core::Reporter;
use crossterm::style::Stylize;

use super::theme::Theme;

#[derive(Debug, Clone, Default)]
pub struct Output {
    theme: Theme,
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also print detail lines.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Suppress everything except warnings, errors and [`Output::result`].
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// A bare value, printed even in quiet mode.
    pub fn result(&self, value: &str) {
        println!("{value}");
    }

    /// An indented `label: value` line.
    pub fn field(&self, label: &str, value: &str) {
        if !self.quiet {
            println!("  {} {value}", format!("{label}:").dark_grey());
        }
    }

    /// An unstyled line.
    pub fn plain(&self, msg: &str) {
        if !self.quiet {
            println!("{msg}");
        }
    }
}

impl Reporter for Output {
    fn section(&self, title: &str) {
        if !self.quiet {
            println!();
            println!("{}", title.bold());
        }
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", self.theme.icons.info.cyan());
        }
    }

    fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{} {}", self.theme.icons.success.green(), msg.green());
        }
    }

    fn warning(&self, msg: &str) {
        eprintln!("{} {}", self.theme.icons.warning.yellow(), msg.yellow());
    }

    fn error(&self, msg: &str) {
        eprintln!("{} {}", self.theme.icons.error.red(), msg.red());
    }

    fn detail(&self, msg: &str) {
        if self.verbose && !self.quiet {
            println!("    {}", msg.dark_grey());
        }
    }
}
