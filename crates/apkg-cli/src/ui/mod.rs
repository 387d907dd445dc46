//! Terminal output for the apkg CLI

pub mod list;
pub mod output;
pub mod theme;

pub use output::Output;
