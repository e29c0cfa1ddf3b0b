//! Proxy module: endpoints, the listing source, and the lease pool
//!
//! This module provides:
//! - `ProxyEndpoint`: a validated `host:port` pair
//! - `ProxySource` / `HttpProxySource`: where fresh endpoints come from
//! - `ProxyPool`: LIFO pool with wait-refill-retry leasing

mod endpoint;
mod listing;
mod pool;

pub use endpoint::{EndpointError, ProxyEndpoint};
pub use listing::{parse_proxy_table, HttpProxySource, ProxySource};
pub use pool::{PoolStats, ProxyPool};
