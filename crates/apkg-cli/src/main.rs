//! apkg - APK package tooling CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use apkg_cli::cmd;
use apkg_cli::{Cli, Commands};
use apkg_core::ProjectLayout;

fn main() -> Result<()> {
    // Initialize logging (core diagnostics go to stderr)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let layout = ProjectLayout::new(&cli.root);

    match cli.command {
        Commands::Build {
            dev,
            arch,
            destination,
            max_dev_builds,
            verbose,
        } => cmd::build::build(
            &layout,
            &cmd::build::BuildArgs {
                dev,
                arch,
                destination,
                max_dev_builds,
                verbose,
            },
        ),
        Commands::Check { verbose } => cmd::build::check(&layout, verbose),
        Commands::Extract {
            apk,
            destination,
            force,
        } => cmd::extract::extract(&apk, &destination, force),
        Commands::List { apk, verbose } => cmd::list::list(&apk, verbose),
        Commands::Version { quiet, command } => cmd::version::run(&layout, &command, quiet),
    }
}
