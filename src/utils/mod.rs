//! Configuration utilities.

/// TOML configuration (`ragbench.toml`).
pub mod toml_config;
