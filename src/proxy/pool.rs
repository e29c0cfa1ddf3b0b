use crate::clock::Clock;
use crate::proxy::listing::{parse_proxy_table, ProxySource};
use crate::proxy::ProxyEndpoint;
use crate::{Failure, HarvestError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Counters kept by the pool over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub leases: u64,
    pub refills: u64,
    pub endpoints_added: u64,
}

/// LIFO pool of proxy endpoints, refilled from a listing source
///
/// An endpoint leaves the pool exactly once: leased endpoints are remembered
/// for the rest of the run and never re-admitted by a refill.
pub struct ProxyPool {
    /// Pooled endpoints; the next lease pops from the end
    endpoints: Vec<ProxyEndpoint>,

    /// Every endpoint handed out so far
    leased: HashSet<ProxyEndpoint>,

    source: Box<dyn ProxySource>,
    clock: Arc<dyn Clock>,

    /// Pause before refilling an empty pool
    refill_wait: Duration,

    /// Cap on consecutive empty wait/refill rounds inside one lease
    max_refill_rounds: Option<u32>,

    stats: PoolStats,
}

impl ProxyPool {
    pub fn new(source: Box<dyn ProxySource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            endpoints: Vec::new(),
            leased: HashSet::new(),
            source,
            clock,
            refill_wait: Duration::from_secs(300),
            max_refill_rounds: None,
            stats: PoolStats::default(),
        }
    }

    pub fn with_refill_wait(mut self, wait: Duration) -> Self {
        self.refill_wait = wait;
        self
    }

    pub fn with_max_refill_rounds(mut self, rounds: Option<u32>) -> Self {
        self.max_refill_rounds = rounds;
        self
    }

    /// Fetches the listing and adds every new endpoint
    ///
    /// Rows are appended in reverse order so the first listed row is leased
    /// first. Endpoints already pooled or already leased are skipped.
    ///
    /// # Returns
    ///
    /// The number of endpoints added, or a Transient failure when the listing
    /// cannot be fetched or has no proxy table.
    pub async fn refill(&mut self) -> Result<usize, Failure> {
        let html = self.source.fetch_listing().await?;
        let rows = parse_proxy_table(&html)?;
        self.stats.refills += 1;

        let mut added = 0;
        for endpoint in rows.into_iter().rev() {
            if self.leased.contains(&endpoint) || self.endpoints.contains(&endpoint) {
                continue;
            }
            self.endpoints.push(endpoint);
            added += 1;
        }

        self.stats.endpoints_added += added as u64;
        tracing::info!(
            "Proxy pool refilled: {} new endpoints, {} available",
            added,
            self.endpoints.len()
        );

        Ok(added)
    }

    /// Takes one endpoint out of the pool for exclusive use
    ///
    /// When the pool is empty this waits, refills and tries again, in a loop.
    /// It only returns an error when `max_refill_rounds` is set and that many
    /// rounds came up empty.
    pub async fn lease(&mut self) -> Result<ProxyEndpoint, HarvestError> {
        let mut rounds = 0u32;

        loop {
            if let Some(endpoint) = self.endpoints.pop() {
                self.leased.insert(endpoint.clone());
                self.stats.leases += 1;
                tracing::debug!(
                    "Leased proxy {} ({} left in pool)",
                    endpoint,
                    self.endpoints.len()
                );
                return Ok(endpoint);
            }

            if let Some(max) = self.max_refill_rounds {
                if rounds >= max {
                    return Err(HarvestError::ProxyPoolExhausted { rounds });
                }
            }
            rounds += 1;

            tracing::warn!(
                "Proxy list is empty. Waiting {:?} before loading a new list",
                self.refill_wait
            );
            self.clock.sleep(self.refill_wait).await;

            if let Err(failure) = self.refill().await {
                tracing::warn!("Proxy refill failed: {}", failure);
            }
        }
    }

    /// Number of endpoints available without refilling
    pub fn available(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns true if the endpoint was ever leased in this run
    pub fn was_leased(&self, endpoint: &ProxyEndpoint) -> bool {
        self.leased.contains(endpoint)
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}
