//! Sleep source for every deliberate pause in a run
//!
//! Backoff, rate-limit pauses, proxy-exhaustion waits and politeness delays all
//! go through a [`Clock`] so tests can observe them without sleeping.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Something that can suspend the current task for a duration
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Clock that returns immediately and records every requested sleep
///
/// Clones share the same record, so a test can keep one handle while the
/// crawler owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingClock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|sleeps| sleeps.clone())
            .unwrap_or_default()
    }

    /// Total simulated time slept
    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }

    /// Number of sleeps exactly equal to `duration`
    pub fn count_of(&self, duration: Duration) -> usize {
        self.sleeps().iter().filter(|d| **d == duration).count()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_clock_records_without_sleeping() {
        let clock = RecordingClock::new();
        let handle = clock.clone();

        clock.sleep(Duration::from_secs(300)).await;
        clock.sleep(Duration::from_secs(5)).await;

        assert_eq!(
            handle.sleeps(),
            vec![Duration::from_secs(300), Duration::from_secs(5)]
        );
        assert_eq!(handle.total(), Duration::from_secs(305));
        assert_eq!(handle.count_of(Duration::from_secs(300)), 1);
    }

    #[tokio::test]
    async fn test_tokio_clock_zero_is_immediate() {
        TokioClock.sleep(Duration::ZERO).await;
    }
}
