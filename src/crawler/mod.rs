//! Crawler module: the run context and the sequential crawl pipeline
//!
//! This module contains the core crawling logic, including:
//! - The run-scoped context (proxy pool + live identity) that performs rotations
//! - Crawl phase tracking
//! - The page → item → product pipeline

mod context;
mod phase;
mod pipeline;

pub use context::{RunContext, SessionSettings};
pub use phase::CrawlPhase;
pub use pipeline::{listing_endpoint, spec_url, CrawlPipeline, CrawlSettings, CrawlState};

