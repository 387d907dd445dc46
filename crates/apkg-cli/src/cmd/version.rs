//! `apkg version` - manifest version management against published tags

use anyhow::{Context, Result};
use apkg_core::release::{GitTagHistory, ReleaseHistory, VersionResolver, bump_revision};
use apkg_core::{ProjectLayout, Reporter};
use apkg_schema::manifest::update_version_in_file;
use apkg_schema::{BaseVersion, Manifest, PackageVersion};

use crate::VersionCommands;
use crate::ui::Output;

/// Tags shown by `version tags` unless quiet.
const TAGS_SHOWN: usize = 10;

/// Dispatch a `version` subcommand.
pub fn run(layout: &ProjectLayout, command: &VersionCommands, quiet: bool) -> Result<()> {
    let output = Output::new().quiet(quiet);
    let resolver = VersionResolver::new(GitTagHistory::new(layout.root()));

    match command {
        VersionCommands::Current => current(layout, &output),
        VersionCommands::Tags => tags(&resolver, &output),
        VersionCommands::Check => check(layout, &resolver, &output),
        VersionCommands::Next { base } => next(layout, &resolver, base.as_deref(), &output),
        VersionCommands::Update => update(layout, &resolver, &output),
        VersionCommands::BumpRevision => bump(layout, &output),
        VersionCommands::Set { base } => set(layout, &resolver, base, &output),
    }
}

fn manifest_version(layout: &ProjectLayout) -> Result<PackageVersion> {
    let path = layout.manifest_path();
    let manifest =
        Manifest::load(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let raw = manifest
        .version()
        .with_context(|| format!("No version in {}", path.display()))?;
    raw.parse::<PackageVersion>()
        .with_context(|| format!("Manifest version {raw} is not X.Y.Z[.rN]"))
}

fn write_version(layout: &ProjectLayout, version: &PackageVersion) -> Result<()> {
    let path = layout.manifest_path();
    update_version_in_file(&path, &version.to_string())
        .with_context(|| format!("Failed to update {}", path.display()))
}

fn current(layout: &ProjectLayout, output: &Output) -> Result<()> {
    let version = manifest_version(layout)?;
    if output.is_quiet() {
        output.result(&version.to_string());
        return Ok(());
    }

    output.info(&format!("Current version: {version}"));
    let revision = version
        .revision()
        .map_or_else(|| "none".to_string(), |r| r.to_string());
    output.field("Base", version.base().as_str());
    output.field("Revision", &revision);
    Ok(())
}

fn tags<H: ReleaseHistory>(resolver: &VersionResolver<H>, output: &Output) -> Result<()> {
    let tags = match resolver.tags() {
        Ok(tags) => tags,
        Err(e) => {
            output.warning(&format!("Could not get git tags: {e}"));
            Vec::new()
        }
    };

    if output.is_quiet() {
        for tag in &tags {
            output.result(tag);
        }
        return Ok(());
    }

    if tags.is_empty() {
        output.info("No version tags found");
        return Ok(());
    }

    output.section(&format!("Version tags ({})", tags.len()));
    for tag in tags.iter().take(TAGS_SHOWN) {
        output.plain(&format!("  {tag}"));
    }
    if tags.len() > TAGS_SHOWN {
        output.plain(&format!("  ... and {} more", tags.len() - TAGS_SHOWN));
    }
    Ok(())
}

fn check<H: ReleaseHistory>(
    layout: &ProjectLayout,
    resolver: &VersionResolver<H>,
    output: &Output,
) -> Result<()> {
    let version = manifest_version(layout)?;
    let base = version.base();
    let latest = resolver.latest_for_base(base);

    if output.is_quiet() {
        output.result(if latest.is_some() { "true" } else { "false" });
        return Ok(());
    }

    match latest {
        Some(latest) => {
            let next = latest.next_revision()?;
            output.warning(&format!("Revision needed: {base} → {next}"));
            output.field("Latest tag", &format!("v{latest}"));
        }
        None => output.success(&format!("No revision needed - {base} is a new version")),
    }
    Ok(())
}

fn next<H: ReleaseHistory>(
    layout: &ProjectLayout,
    resolver: &VersionResolver<H>,
    base: Option<&str>,
    output: &Output,
) -> Result<()> {
    let base: BaseVersion = match base {
        Some(raw) => raw.parse()?,
        None => manifest_version(layout)?.base().clone(),
    };
    let next = resolver.next_version(&base)?;

    if output.is_quiet() {
        output.result(&next.to_string());
    } else if next.revision().is_none() {
        output.info(&format!("Next version: {next} (new)"));
    } else {
        output.field("Base version", base.as_str());
        output.field("Next version", &next.to_string());
        output.info("Revision added because tag already exists");
    }
    Ok(())
}

fn update<H: ReleaseHistory>(
    layout: &ProjectLayout,
    resolver: &VersionResolver<H>,
    output: &Output,
) -> Result<()> {
    let current = manifest_version(layout)?;
    let next = resolver.next_version(current.base())?;

    output.field("Current", &current.to_string());
    output.field("Next", &next.to_string());

    if next == current {
        output.success(&format!("config.json already at {next}"));
    } else {
        write_version(layout, &next)?;
        output.success(&format!("Updated config.json to {next}"));
    }

    if output.is_quiet() {
        output.result(&next.to_string());
    }
    Ok(())
}

fn bump(layout: &ProjectLayout, output: &Output) -> Result<()> {
    let current = manifest_version(layout)?;
    let next = bump_revision(&current)?;
    write_version(layout, &next)?;

    if output.is_quiet() {
        output.result(&next.to_string());
    } else {
        output.success(&format!("Bumped revision: {current} → {next}"));
    }
    Ok(())
}

fn set<H: ReleaseHistory>(
    layout: &ProjectLayout,
    resolver: &VersionResolver<H>,
    raw: &str,
    output: &Output,
) -> Result<()> {
    let Ok(base) = raw.parse::<BaseVersion>() else {
        output.info("Expected format: X.Y.Z (e.g., 4.6.5)");
        anyhow::bail!("Invalid base version format: {raw}");
    };

    let next = resolver.next_version(&base)?;
    if next.revision().is_some() {
        output.warning(&format!("Tag for {base} exists, adding revision"));
    }
    write_version(layout, &next)?;

    if output.is_quiet() {
        output.result(&next.to_string());
    } else {
        output.success(&format!("Set version to {next}"));
    }
    Ok(())
}
