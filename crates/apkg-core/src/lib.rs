pub mod archive;
pub mod builder;
pub mod checksum;
pub mod dev_counter;
pub mod envelope;
pub mod notices;
pub mod paths;
pub mod reader;
pub mod release;
pub mod retention;
pub mod settings;
pub mod text;
pub mod validate;

pub mod reporter;

pub use builder::{
    BuildError, BuildOutcome, BuildRequest, ManifestOverrides, PackageBuilder, ReleaseKind,
};
pub use paths::*;
pub use reader::{Listing, PackageInfo, PackageReader, ReadError};
pub use reporter::{NullReporter, Reporter};
pub use settings::BuildSettings;
