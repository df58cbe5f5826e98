//! Scope Configuration Module
//!
//! Construction-time parameters for both plot pipelines, loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `SCOPE_CONFIG` environment variable (path to TOML file)
//! 2. `scope_config.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! ## Usage
//!
//! ```ignore
//! let config = ScopeConfig::load();
//! let controller = PipelineController::new(config)?;
//! ```
//!
//! Nothing here is mutable at runtime: a controller keeps the config it was
//! built with.

mod scope_config;
pub mod defaults;
pub mod validation;

pub use scope_config::*;
