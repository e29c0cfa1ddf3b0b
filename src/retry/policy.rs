use crate::config::RetryConfig;
use crate::FailureCategory;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;

/// What to change before the next attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// New user agent and new proxy
    RotateIdentity,
    /// New proxy, same user agent
    RotateProxy,
    /// Retry unchanged
    Nothing,
    /// Do not retry; hand the failure to the caller
    Propagate,
}

/// Pause slept before the next attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    None,
    /// Uniformly random pause in `min..=max`
    Jitter { min: Duration, max: Duration },
}

impl Backoff {
    pub fn jitter_up_to(max: Duration) -> Self {
        Self::Jitter {
            min: Duration::ZERO,
            max,
        }
    }

    /// Draws one pause from this backoff
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Jitter { min, max } => {
                let low = min.as_millis() as u64;
                let high = (max.as_millis() as u64).max(low);
                Duration::from_millis(rng.random_range(low..=high))
            }
        }
    }
}

/// Recovery action plus backoff for one failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPlan {
    pub action: RecoveryAction,
    pub backoff: Backoff,
}

/// Category → recovery mapping used by the orchestrator
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    plans: HashMap<FailureCategory, RecoveryPlan>,
    max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    /// | Category | Action | Backoff |
    /// |----------|--------|---------|
    /// | SoftBlock | rotate identity | 0–10 s |
    /// | ProxyFailure | rotate proxy | 0–10 s |
    /// | RateLimited | nothing | none (the client already paused) |
    /// | Transient | nothing | 0–60 s |
    /// | Fatal | propagate | none |
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        let mut plans = HashMap::new();
        plans.insert(
            FailureCategory::SoftBlock,
            RecoveryPlan {
                action: RecoveryAction::RotateIdentity,
                backoff: Backoff::jitter_up_to(Duration::from_secs(config.soft_block_jitter_secs)),
            },
        );
        plans.insert(
            FailureCategory::ProxyFailure,
            RecoveryPlan {
                action: RecoveryAction::RotateProxy,
                backoff: Backoff::jitter_up_to(Duration::from_secs(
                    config.proxy_failure_jitter_secs,
                )),
            },
        );
        plans.insert(
            FailureCategory::RateLimited,
            RecoveryPlan {
                action: RecoveryAction::Nothing,
                backoff: Backoff::None,
            },
        );
        plans.insert(
            FailureCategory::Transient,
            RecoveryPlan {
                action: RecoveryAction::Nothing,
                backoff: Backoff::jitter_up_to(Duration::from_secs(config.transient_jitter_secs)),
            },
        );

        Self {
            plans,
            max_attempts: config.max_attempts,
        }
    }

    /// Overrides the plan for one category; Fatal always propagates
    pub fn with_plan(mut self, category: FailureCategory, plan: RecoveryPlan) -> Self {
        if category.is_retryable() {
            self.plans.insert(category, plan);
        }
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Removes every backoff; recovery actions are kept
    pub fn without_backoff(mut self) -> Self {
        for plan in self.plans.values_mut() {
            plan.backoff = Backoff::None;
        }
        self
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn plan(&self, category: FailureCategory) -> RecoveryPlan {
        if !category.is_retryable() {
            return RecoveryPlan {
                action: RecoveryAction::Propagate,
                backoff: Backoff::None,
            };
        }

        self.plans
            .get(&category)
            .copied()
            .unwrap_or(RecoveryPlan {
                action: RecoveryAction::Nothing,
                backoff: Backoff::None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let policy = RetryPolicy::default();

        assert_eq!(
            policy.plan(FailureCategory::SoftBlock).action,
            RecoveryAction::RotateIdentity
        );
        assert_eq!(
            policy.plan(FailureCategory::ProxyFailure).action,
            RecoveryAction::RotateProxy
        );
        assert_eq!(
            policy.plan(FailureCategory::RateLimited),
            RecoveryPlan {
                action: RecoveryAction::Nothing,
                backoff: Backoff::None,
            }
        );
        assert_eq!(
            policy.plan(FailureCategory::Transient).backoff,
            Backoff::jitter_up_to(Duration::from_secs(60))
        );
        assert_eq!(
            policy.plan(FailureCategory::Fatal).action,
            RecoveryAction::Propagate
        );
        assert_eq!(policy.max_attempts(), None);
    }

    #[test]
    fn test_fatal_cannot_be_overridden() {
        let policy = RetryPolicy::default().with_plan(
            FailureCategory::Fatal,
            RecoveryPlan {
                action: RecoveryAction::Nothing,
                backoff: Backoff::None,
            },
        );
        assert_eq!(
            policy.plan(FailureCategory::Fatal).action,
            RecoveryAction::Propagate
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let backoff = Backoff::Jitter {
            min: Duration::from_secs(2),
            max: Duration::from_secs(5),
        };
        let mut rng = rand::rng();
        for _ in 0..200 {
            let pause = backoff.sample(&mut rng);
            assert!(pause >= Duration::from_secs(2) && pause <= Duration::from_secs(5));
        }
        assert_eq!(Backoff::None.sample(&mut rng), Duration::ZERO);
    }

    #[test]
    fn test_without_backoff_keeps_actions() {
        let policy = RetryPolicy::default().without_backoff();
        let plan = policy.plan(FailureCategory::SoftBlock);
        assert_eq!(plan.action, RecoveryAction::RotateIdentity);
        assert_eq!(plan.backoff, Backoff::None);
    }
}
