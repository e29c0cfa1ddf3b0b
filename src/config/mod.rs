//! Configuration module for Market-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use market_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting {} pages of '{}'", config.target.pages, config.target.query);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, IdentityConfig, OutputConfig, PacingConfig, ProxyConfig, RetryConfig, TargetConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
