//! apkg - APK package tooling
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Builds ASUSTOR APK packages from a project tree, inspects and unpacks
//! built packages, and manages the package version against published tags.
//!
//! # Project Layout
//!
//! ```text
//! <root>/
//! ├── apk/            # Package root (payload)
//! │   ├── CONTROL/    # Control files, config.json manifest
//! │   └── bin/        # Binary staging, not packaged
//! ├── scripts/        # Helper scripts (line endings normalized)
//! ├── CHANGELOG.md
//! ├── LICENSE
//! ├── releases/       # Production artifacts + .sha256 sidecars
//! │   └── dev/        # Pre-release artifacts
//! └── build/          # Pre-release counter
//! ```

pub mod cmd;
pub mod ui;

use apkg_schema::Arch;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "apkg")]
#[command(author, version, about = "apkg - build and inspect ASUSTOR APK packages")]
pub struct Cli {
    /// Project root (contains apk/, releases/, ...)
    #[arg(long, global = true, env = "APKG_ROOT", default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate the package and build an APK
    Build {
        /// Build a numbered pre-release into releases/dev/
        #[arg(long)]
        dev: bool,
        /// Build for a different architecture than the manifest declares
        #[arg(long)]
        arch: Option<Arch>,
        /// Output directory (default: releases/ or releases/dev/)
        #[arg(short, long)]
        destination: Option<PathBuf>,
        /// Pre-release artifacts to keep (at least 1)
        #[arg(
            long,
            env = "APKG_MAX_DEV_BUILDS",
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        max_dev_builds: Option<usize>,
        /// Show every validation note and converted script
        #[arg(short, long)]
        verbose: bool,
    },
    /// Validate the control files and manifest without building
    Check {
        /// Show optional files that are absent
        #[arg(short, long)]
        verbose: bool,
    },
    /// Unpack an APK into <name>_<version>_<arch>/
    Extract {
        /// Package to unpack
        apk: PathBuf,
        /// Directory the package folder is created in
        #[arg(short, long, default_value = ".")]
        destination: PathBuf,
        /// Replace an existing package folder
        #[arg(short, long)]
        force: bool,
    },
    /// Show the contents of an APK
    List {
        /// Package to inspect
        apk: PathBuf,
        /// Also show mode and size of payload files
        #[arg(short, long)]
        verbose: bool,
    },
    /// Manage the manifest version against published release tags
    Version {
        /// Print only the result (for scripts)
        #[arg(short, long)]
        quiet: bool,

        #[command(subcommand)]
        command: VersionCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum VersionCommands {
    /// Show the manifest version
    Current,
    /// List published version tags, newest first
    Tags,
    /// Check whether the current base version needs a revision
    Check,
    /// Show the next version to release
    Next {
        /// Base version to resolve instead of the manifest's
        #[arg(long)]
        base: Option<String>,
    },
    /// Write the next version into the manifest
    Update,
    /// Increment the revision in the manifest without consulting tags
    BumpRevision,
    /// Set a new base version (a revision is added if it was released)
    Set {
        /// Base version, X.Y.Z
        base: String,
    },
}
