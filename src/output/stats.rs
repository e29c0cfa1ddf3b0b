//! Run statistics gathered by the crawl pipeline

use crate::proxy::PoolStats;
use crate::retry::RetryStats;
use crate::FailureCategory;
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Counters for one crawl run
#[derive(Debug, Clone)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Listing pages fetched and parsed
    pub pages_fetched: u32,

    /// Listing pages that contained no items
    pub empty_pages: u32,

    pub products: u64,

    /// Products whose detail and spec pages were fetched
    pub products_with_full_info: u64,

    pub identity_rotations: u64,
    pub proxy_rotations: u64,

    pub retry: RetryStats,
    pub pool: PoolStats,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            pages_fetched: 0,
            empty_pages: 0,
            products: 0,
            products_with_full_info: 0,
            identity_rotations: 0,
            proxy_rotations: 0,
            retry: RetryStats::default(),
            pool: PoolStats::default(),
        }
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    /// Formats the statistics as the block printed at the end of a run
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "=== Harvest Statistics ===\n");

        let _ = writeln!(out, "Overview:");
        let _ = writeln!(out, "  Started: {}", self.started_at.to_rfc3339());
        if let Some(seconds) = self.duration_seconds() {
            let _ = writeln!(out, "  Duration: {}s", seconds);
        }
        let _ = writeln!(out, "  Listing pages fetched: {}", self.pages_fetched);
        let _ = writeln!(out, "  Empty listing pages: {}", self.empty_pages);
        let _ = writeln!(out, "  Products: {}", self.products);
        let _ = writeln!(
            out,
            "  Products with full info: {}",
            self.products_with_full_info
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "Identity:");
        let _ = writeln!(out, "  Identity rotations: {}", self.identity_rotations);
        let _ = writeln!(out, "  Proxy rotations: {}", self.proxy_rotations);
        let _ = writeln!(out, "  Proxies leased: {}", self.pool.leases);
        let _ = writeln!(
            out,
            "  Proxy list refills: {} ({} endpoints added)",
            self.pool.refills, self.pool.endpoints_added
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "Requests:");
        let _ = writeln!(out, "  Operations: {}", self.retry.operations);
        let _ = writeln!(out, "  Attempts: {}", self.retry.attempts);

        let failures: Vec<_> = FailureCategory::all()
            .into_iter()
            .map(|category| (category, self.retry.failures_of(category)))
            .filter(|(_, count)| *count > 0)
            .collect();
        if !failures.is_empty() {
            let _ = writeln!(out, "\nFailures by Category:");
            for (category, count) in failures {
                let _ = writeln!(out, "  {}: {}", category, count);
            }
        }

        let success_rate = if self.retry.attempts > 0 {
            self.retry.operations as f64 / self.retry.attempts as f64 * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            out,
            "\nFirst-try Rate: {:.1}% ({} operations / {} attempts)",
            success_rate, self.retry.operations, self.retry.attempts
        );

        out
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &RunStats) {
    print!("{}", stats.render());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_counters() {
        let mut stats = RunStats::new();
        stats.pages_fetched = 2;
        stats.products = 5;
        stats.identity_rotations = 1;
        stats.retry.operations = 8;
        stats.retry.attempts = 10;
        stats.retry.failures.insert(FailureCategory::SoftBlock, 2);

        let text = stats.render();

        assert!(text.contains("Listing pages fetched: 2"));
        assert!(text.contains("Products: 5"));
        assert!(text.contains("Identity rotations: 1"));
        assert!(text.contains("soft_block: 2"));
        assert!(!text.contains("transient"));
        assert!(text.contains("First-try Rate: 80.0%"));
    }

    #[test]
    fn test_duration_needs_finish_time() {
        let mut stats = RunStats::new();
        assert_eq!(stats.duration_seconds(), None);

        stats.finished_at = Some(stats.started_at + chrono::Duration::seconds(90));
        assert_eq!(stats.duration_seconds(), Some(90));
    }
}
