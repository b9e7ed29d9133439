pub mod aggregate;
pub mod config;
pub mod engine;
pub mod event;
pub mod loader;
pub mod mock;
pub mod normalize;

/// Archive entry suffix treated as an event file (matched case-insensitively)
pub const JSON_SUFFIX: &str = ".json";

/// Application name for XDG paths
pub const APP_NAME: &str = "skipscan";
