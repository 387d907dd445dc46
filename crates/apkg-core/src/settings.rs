/// Number of pre-release artifacts kept in the dev output directory.
pub const DEFAULT_MAX_DEV_BUILDS: usize = 5;

/// Tunables for the build pipeline that come from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// How many pre-release artifacts survive pruning.
    pub max_dev_builds: usize,
    /// Fixed mtime for every archive entry (`SOURCE_DATE_EPOCH`), if set.
    pub source_date_epoch: Option<u64>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            max_dev_builds: DEFAULT_MAX_DEV_BUILDS,
            source_date_epoch: None,
        }
    }
}

impl BuildSettings {
    /// Load settings from environment variables.
    ///
    /// `APKG_MAX_DEV_BUILDS` overrides the retention count and
    /// `SOURCE_DATE_EPOCH` pins entry timestamps. Unparseable values are
    /// ignored.
    pub fn from_env() -> Self {
        let max_dev_builds = parse_max_dev_builds(std::env::var("APKG_MAX_DEV_BUILDS").ok());

        let source_date_epoch = std::env::var("SOURCE_DATE_EPOCH")
            .ok()
            .and_then(|v| v.trim().parse().ok());

        Self {
            max_dev_builds,
            source_date_epoch,
        }
    }
}

/// Retention count from a raw setting: at least one, the default when
/// absent or unparseable.
fn parse_max_dev_builds(raw: Option<String>) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .map_or(DEFAULT_MAX_DEV_BUILDS, |n| n.max(1))
}
