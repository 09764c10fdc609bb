//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/docsync/config.toml)
//! 3. Project config (.docsync/config.toml)
//! 4. Environment variables (DOCSYNC_*)
//!
//! The resolved `Config` is built once and passed to every component.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
