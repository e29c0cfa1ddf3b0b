//! Market-Harvester: an unattended product-listing crawler
//!
//! This crate walks the search results of a market site page by page, fetching
//! every product's detail and specification pages through a rotating pool of
//! proxies. It survives CAPTCHA blocks, dead proxies, rate limiting and
//! transient network failures by classifying every failure and applying a
//! category-specific recovery action before retrying.

pub mod clock;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod identity;
pub mod output;
pub mod proxy;
pub mod retry;

#[cfg(test)]
mod test_support;

use std::fmt;
use thiserror::Error;

/// Outcome class of a failed attempt, decided where the failure is observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// The site detected automated traffic (CAPTCHA or missing listing markup)
    SoftBlock,

    /// The leased proxy could not carry the request
    ProxyFailure,

    /// The site answered HTTP 429; the client has already paused
    RateLimited,

    /// Anything else that is worth retrying unchanged
    Transient,

    /// A malformed call that no retry can fix
    Fatal,
}

impl FailureCategory {
    /// Returns true if the orchestrator may retry this category
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal)
    }

    /// Returns a short lowercase label used in logs and statistics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SoftBlock => "soft_block",
            Self::ProxyFailure => "proxy_failure",
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        }
    }

    /// Returns all categories in declaration order
    pub fn all() -> [Self; 5] {
        [
            Self::SoftBlock,
            Self::ProxyFailure,
            Self::RateLimited,
            Self::Transient,
            Self::Fatal,
        ]
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure of a single attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{category}: {message}")]
pub struct Failure {
    pub category: FailureCategory,
    pub message: String,
}

impl Failure {
    pub fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn soft_block(message: impl Into<String>) -> Self {
        Self::new(FailureCategory::SoftBlock, message)
    }

    pub fn proxy(message: impl Into<String>) -> Self {
        Self::new(FailureCategory::ProxyFailure, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FailureCategory::RateLimited, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureCategory::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(FailureCategory::Fatal, message)
    }
}

/// Main error type for Market-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fatal failure in {operation}: {message}")]
    Fatal { operation: String, message: String },

    #[error("Gave up on {operation} after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: Failure,
    },

    #[error("Proxy pool still empty after {rounds} refill rounds")]
    ProxyPoolExhausted { rounds: u32 },

    #[error("Extraction error: {0}")]
    Extraction(#[from] extract::ExtractionError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Market-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlPipeline, RunContext};
pub use output::{Product, ProductFullInfo, ProductPreview, ProductSink};
pub use proxy::{ProxyEndpoint, ProxyPool};
