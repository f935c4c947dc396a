//! CLI command implementations

pub mod migrate;

pub use migrate::MigrateArgs;
