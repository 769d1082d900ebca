//! Resolver configuration.
//!
//! # Configuration Sources (in priority order, highest to lowest)
//!
//! 1. Values set programmatically with [`ResolverConfig::set`]
//! 2. Environment variables (`MODWIRE_*`)
//! 3. The `resolver` section of the project `modwire.json`
//! 4. Built-in defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use modwire_resolver::config::ResolverConfig;
//! use std::path::Path;
//!
//! let config = ResolverConfig::build(Some(Path::new("/path/to/project")), true).unwrap();
//! println!("Iteration budget: {}", config.max_iterations);
//! ```

mod config;
mod source;

pub use config::ResolverConfig;
pub use source::{ConfigLoader, ConfigSource, RawConfig, CONFIG_FILE, ENV_PREFIX};
