//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the TOML configuration file from an explicit
//! path or from the platform-appropriate directory, and falls back to defaults
//! when the file does not exist yet (first run).

pub mod config;
