//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the station's TOML file from the platform
//! config directory (or an explicit path), writes it back, and supplies
//! defaults on first run when no file exists yet.

pub mod config;
