//! `apkg build` and `apkg check`

use std::path::PathBuf;

use anyhow::{Context, Result};
use apkg_core::builder::next_pre_release;
use apkg_core::{
    BuildError, BuildRequest, BuildSettings, PackageBuilder, ProjectLayout, ReleaseKind, Reporter,
};
use apkg_schema::Arch;

use crate::ui::Output;

/// Options of `apkg build`.
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
    pub dev: bool,
    pub arch: Option<Arch>,
    pub destination: Option<PathBuf>,
    pub max_dev_builds: Option<usize>,
    pub verbose: bool,
}

/// Validate and build the package in `layout`.
pub fn build(layout: &ProjectLayout, args: &BuildArgs) -> Result<()> {
    let output = Output::new().verbose(args.verbose);

    let mut settings = BuildSettings::from_env();
    if let Some(keep) = args.max_dev_builds {
        settings.max_dev_builds = keep;
    }

    let mut request = BuildRequest::new(layout.clone());
    request.destination.clone_from(&args.destination);
    request.overrides.arch = args.arch;

    if args.dev {
        let (version, dev_build) =
            next_pre_release(layout).context("Failed to prepare pre-release build")?;
        output.section(&format!("DEV MODE - Build #{}", dev_build.number));
        if let Some(previous) = &dev_build.reset_from {
            output.info(&format!("Version changed from {previous}, build counter reset"));
        }
        output.field("Dev version", &version);

        request.kind = ReleaseKind::PreRelease;
        request.overrides.version = Some(version);
    }

    let builder = PackageBuilder::new(settings, &output);
    let outcome = match builder.build(&request) {
        Ok(outcome) => outcome,
        Err(BuildError::Validation(report)) => {
            anyhow::bail!(
                "Package validation failed with {} error(s)",
                report.errors().count()
            );
        }
        Err(e) => return Err(e).context("Build failed"),
    };

    output.section("Build complete");
    output.field("Package", &outcome.artifact.display().to_string());
    output.field("Version", &outcome.identity.version);
    output.field("Architecture", outcome.identity.arch.as_str());
    output.field("Size", &format!("{} KB", outcome.size / 1024));
    if let Some(digest) = &outcome.checksum {
        output.field("SHA256", digest);
    }
    let warnings = outcome.report.warnings().count();
    if warnings > 0 {
        output.info(&format!("{warnings} validation warning(s)"));
    }

    Ok(())
}

/// Validate the package in `layout` without building.
pub fn check(layout: &ProjectLayout, verbose: bool) -> Result<()> {
    let output = Output::new().verbose(verbose);
    let builder = PackageBuilder::new(BuildSettings::default(), &output);

    let report = builder
        .validate(layout)
        .context("Failed to read the manifest")?;
    if !report.passed() {
        anyhow::bail!(
            "Package validation failed with {} error(s)",
            report.errors().count()
        );
    }

    output.success("Package is valid");
    Ok(())
}
