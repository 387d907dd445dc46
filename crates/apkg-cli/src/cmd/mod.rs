//! Command implementations

pub mod build;
pub mod extract;
pub mod list;
pub mod version;
