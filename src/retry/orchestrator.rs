use crate::clock::Clock;
use crate::retry::policy::{RecoveryAction, RetryPolicy};
use crate::{Failure, FailureCategory, HarvestError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Something that can carry out a recovery action
#[async_trait]
pub trait Recover: Send {
    async fn recover(&mut self, action: RecoveryAction) -> Result<(), HarvestError>;
}

/// One retryable operation against a context `C`
///
/// `attempt` must be safe to call again after any failure; the orchestrator
/// re-invokes it until it succeeds or fails as Fatal.
#[async_trait]
pub trait Retryable<C: Send>: Send {
    type Output: Send;

    /// Short label for logs
    fn describe(&self) -> String;

    async fn attempt(&mut self, ctx: &mut C) -> Result<Self::Output, Failure>;
}

/// Retry counters kept over a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub operations: u64,
    pub attempts: u64,
    pub failures: HashMap<FailureCategory, u64>,
}

impl RetryStats {
    pub fn failures_of(&self, category: FailureCategory) -> u64 {
        self.failures.get(&category).copied().unwrap_or(0)
    }
}

/// Applies a [`RetryPolicy`] to retryable operations
///
/// On each failure: log a warning, perform the category's recovery action on
/// the context, sleep its backoff on the clock, then attempt again. Fatal
/// failures are returned at once.
pub struct RetryOrchestrator {
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    stats: RetryStats,
}

impl RetryOrchestrator {
    pub fn new(policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            stats: RetryStats::default(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &RetryStats {
        &self.stats
    }

    /// Runs `op` until it succeeds
    ///
    /// # Errors
    ///
    /// * `HarvestError::Fatal` - the operation failed as Fatal
    /// * `HarvestError::RetriesExhausted` - `max_attempts` is set and was reached
    /// * any error raised while recovering (e.g. an exhausted proxy pool)
    pub async fn execute<C, O>(&mut self, ctx: &mut C, op: &mut O) -> Result<O::Output, HarvestError>
    where
        C: Recover + Send,
        O: Retryable<C>,
    {
        self.stats.operations += 1;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.stats.attempts += 1;

            let failure = match op.attempt(ctx).await {
                Ok(output) => {
                    if attempt > 1 {
                        tracing::info!("{} succeeded on attempt {}", op.describe(), attempt);
                    }
                    return Ok(output);
                }
                Err(failure) => failure,
            };

            *self.stats.failures.entry(failure.category).or_insert(0) += 1;

            let plan = self.policy.plan(failure.category);
            if plan.action == RecoveryAction::Propagate {
                tracing::error!("{} failed fatally: {}", op.describe(), failure.message);
                return Err(HarvestError::Fatal {
                    operation: op.describe(),
                    message: failure.message,
                });
            }

            if let Some(max) = self.policy.max_attempts() {
                if attempt >= max {
                    tracing::error!(
                        "{} still failing after {} attempts: {}",
                        op.describe(),
                        attempt,
                        failure
                    );
                    return Err(HarvestError::RetriesExhausted {
                        operation: op.describe(),
                        attempts: attempt,
                        last: failure,
                    });
                }
            }

            let pause = plan.backoff.sample(&mut rand::rng());
            tracing::warn!(
                "{} failed (attempt {}): {}. Recovery: {:?}, retrying in {:?}",
                op.describe(),
                attempt,
                failure,
                plan.action,
                pause
            );

            if plan.action != RecoveryAction::Nothing {
                ctx.recover(plan.action).await?;
            }
            if !pause.is_zero() {
                self.clock.sleep(pause).await;
            }
        }
    }
}
