//! Retry module: failure-category policy and the orchestrator applying it
//!
//! | Category | Recovery action | Backoff |
//! |----------|-----------------|---------|
//! | SoftBlock | rotate identity (user agent + proxy) | small jitter |
//! | ProxyFailure | rotate proxy | small jitter |
//! | RateLimited | none (the client already paused) | none |
//! | Transient | none | jitter up to 60 s |
//! | Fatal | no retry | propagate |

mod orchestrator;
mod policy;

pub use orchestrator::{Recover, Retryable, RetryOrchestrator, RetryStats};
pub use policy::{Backoff, RecoveryAction, RecoveryPlan, RetryPolicy};
