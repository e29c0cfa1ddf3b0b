use crate::clock::{Clock, TokioClock};
use crate::config::Config;
use crate::crawler::context::{RunContext, SessionSettings};
use crate::crawler::phase::CrawlPhase;
use crate::extract::{ExtractionError, Item, MarketExtractor, PageExtractor};
use crate::identity::{Identity, ReqwestTransport};
use crate::output::{Product, ProductFullInfo, ProductSink, RunStats};
use crate::proxy::{HttpProxySource, ProxyPool};
use crate::retry::{RetryOrchestrator, RetryPolicy, Retryable};
use crate::{Failure, HarvestError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// What to crawl and how fast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    pub query: String,
    pub pages: u32,
    pub politeness_min: Duration,
    pub politeness_max: Duration,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        let (politeness_min, politeness_max) = config.pacing.politeness_range();
        Self {
            query: config.target.query.clone(),
            pages: config.target.pages,
            politeness_min,
            politeness_max,
        }
    }

    fn politeness_delay(&self) -> Duration {
        if self.politeness_max <= self.politeness_min {
            return self.politeness_min;
        }
        let min = self.politeness_min.as_millis() as u64;
        let max = self.politeness_max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// Mutable progress of one crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlState {
    /// Listing page being worked on, 0 before the first fetch
    pub current_page: u32,
    pub phase: CrawlPhase,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self {
            current_page: 0,
            phase: CrawlPhase::Idle,
        }
    }
}

/// Fetches one listing page and splits it into items
///
/// Fetch and parse are one attempt: a page that comes back without the
/// listing container is a disguised block and is retried as SoftBlock.
struct FetchListing<'a> {
    extractor: &'a dyn PageExtractor,
    endpoint: String,
    page: u32,
}

#[async_trait]
impl<'a> Retryable<RunContext> for FetchListing<'a> {
    type Output = Vec<Item>;

    fn describe(&self) -> String {
        format!("listing page {}", self.page)
    }

    async fn attempt(&mut self, ctx: &mut RunContext) -> std::result::Result<Vec<Item>, Failure> {
        let response = ctx.client_mut().get(&self.endpoint).await?;

        self.extractor
            .parse_listing(&response.body, self.page)
            .map_err(|e| match e {
                ExtractionError::MissingContainer(_) => {
                    Failure::soft_block(format!("listing page {}: {}", self.page, e))
                }
                ExtractionError::InvalidSelector { .. } => Failure::fatal(e.to_string()),
            })
    }
}

/// Fetches a detail or spec page body
struct FetchPage {
    url: String,
    label: &'static str,
}

#[async_trait]
impl Retryable<RunContext> for FetchPage {
    type Output = String;

    fn describe(&self) -> String {
        format!("{} {}", self.label, self.url)
    }

    async fn attempt(&mut self, ctx: &mut RunContext) -> std::result::Result<String, Failure> {
        ctx.client_mut().get(&self.url).await.map(|response| response.body)
    }
}

/// Sequential page → item → product crawl
///
/// Every fetch goes through the retry orchestrator with the run context as
/// its recovery target. Products are appended in page order, then item order.
pub struct CrawlPipeline {
    context: RunContext,
    retry: RetryOrchestrator,
    extractor: Box<dyn PageExtractor>,
    sink: ProductSink,
    settings: CrawlSettings,
    state: CrawlState,
    clock: Arc<dyn Clock>,
    stats: RunStats,
}

impl CrawlPipeline {
    pub fn new(
        context: RunContext,
        retry: RetryOrchestrator,
        extractor: Box<dyn PageExtractor>,
        settings: CrawlSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            context,
            retry,
            extractor,
            sink: ProductSink::new(),
            settings,
            state: CrawlState::default(),
            clock,
            stats: RunStats::new(),
        }
    }

    /// Builds the production pipeline: HTTP proxy list, reqwest transport,
    /// market extractor and real sleeps
    ///
    /// This already talks to the network: the proxy pool is filled and the
    /// first identity is bound before it returns.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock);
        let timeout = Duration::from_secs(config.identity.request_timeout_secs);

        let source = HttpProxySource::new(config.proxy.list_url.clone(), timeout)?;
        let pool = ProxyPool::new(Box::new(source), clock.clone())
            .with_refill_wait(Duration::from_secs(config.proxy.refill_wait_secs))
            .with_max_refill_rounds(config.proxy.max_refill_rounds);

        let session = SessionSettings::from_config(config)?;
        let extractor = MarketExtractor::new(
            session.base_url.clone(),
            &config.target.redirector_marker,
        )?;

        let transport = ReqwestTransport::new(timeout);
        let context = RunContext::establish(pool, Box::new(transport), session, clock.clone()).await?;

        let retry = RetryOrchestrator::new(RetryPolicy::from_config(&config.retry), clock.clone());

        Ok(Self::new(
            context,
            retry,
            Box::new(extractor),
            CrawlSettings::from_config(config),
            clock,
        ))
    }

    pub fn sink(&self) -> &ProductSink {
        &self.sink
    }

    pub fn into_sink(self) -> ProductSink {
        self.sink
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    pub fn identity(&self) -> &Identity {
        self.context.identity()
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Walks listing pages 1..=N
    ///
    /// A page with no items does not end the crawl; every configured page is
    /// requested. Recoverable failures are retried inside; only Fatal-class
    /// errors come back out, and products gathered so far stay in the sink.
    pub async fn run(&mut self) -> Result<()> {
        if self.state.phase.is_terminal() {
            tracing::warn!("Crawl already finished; not running again");
            return Ok(());
        }

        tracing::info!(
            "Harvesting '{}': {} listing pages",
            self.settings.query,
            self.settings.pages
        );

        let outcome = self.walk().await;

        self.stats.finished_at = Some(Utc::now());
        self.stats.retry = self.retry.stats().clone();
        self.stats.pool = self.context.pool_stats();
        self.stats.identity_rotations = self.context.identity_rotations();
        self.stats.proxy_rotations = self.context.proxy_rotations();

        match &outcome {
            Ok(()) => tracing::info!("Harvest complete: {} products", self.sink.len()),
            Err(e) => tracing::error!(
                "Harvest stopped on page {} after {} products: {}",
                self.state.current_page,
                self.sink.len(),
                e
            ),
        }
        outcome
    }

    async fn walk(&mut self) -> Result<()> {
        if self.settings.query.trim().is_empty() {
            return Err(HarvestError::Fatal {
                operation: "search".to_string(),
                message: "search query is missing".to_string(),
            });
        }

        for page in 1..=self.settings.pages {
            if page > 1 {
                let delay = self.settings.politeness_delay();
                tracing::debug!("Politeness delay {:?} before page {}", delay, page);
                self.clock.sleep(delay).await;
            }

            self.state.current_page = page;
            self.transition(CrawlPhase::FetchingListing);

            let mut op = FetchListing {
                extractor: self.extractor.as_ref(),
                endpoint: listing_endpoint(&self.settings.query, page),
                page,
            };
            let items = self.retry.execute(&mut self.context, &mut op).await?;

            self.transition(CrawlPhase::ExtractingItems);
            self.stats.pages_fetched += 1;

            if items.is_empty() {
                self.stats.empty_pages += 1;
                tracing::info!("Page {}/{}: no items", page, self.settings.pages);
                continue;
            }
            tracing::info!(
                "Page {}/{}: {} items",
                page,
                self.settings.pages,
                items.len()
            );

            for item in &items {
                let preview = self.extractor.parse_preview(item);

                let full_info = match preview.product_url.clone() {
                    Some(url) => Some(self.fetch_full_info(&url).await?),
                    None => {
                        tracing::debug!(
                            "Item {} on page {} has no product link",
                            item.position(),
                            page
                        );
                        None
                    }
                };

                self.transition(CrawlPhase::Accumulating);
                if full_info.is_some() {
                    self.stats.products_with_full_info += 1;
                }
                tracing::debug!("Product: {}", preview.name);
                self.sink.append(Product::new(preview, full_info));
                self.stats.products += 1;
            }
        }

        self.transition(CrawlPhase::Done);
        Ok(())
    }

    async fn fetch_full_info(&mut self, product_url: &str) -> Result<ProductFullInfo> {
        self.transition(CrawlPhase::FetchingDetail);

        let mut detail = FetchPage {
            url: product_url.to_string(),
            label: "detail page",
        };
        let detail_html = self.retry.execute(&mut self.context, &mut detail).await?;

        let mut spec = FetchPage {
            url: spec_url(product_url),
            label: "spec page",
        };
        let spec_html = self.retry.execute(&mut self.context, &mut spec).await?;

        self.transition(CrawlPhase::ExtractingFullInfo);
        Ok(self.extractor.parse_full_info(&detail_html, &spec_html))
    }

    fn transition(&mut self, next: CrawlPhase) {
        if !self.state.phase.can_transition_to(next) {
            tracing::warn!("Unexpected phase change {} -> {}", self.state.phase, next);
        }
        tracing::trace!("Phase {} -> {}", self.state.phase, next);
        self.state.phase = next;
    }
}

/// `/search?text=<query>&page=<n>`, query form-encoded
pub fn listing_endpoint(query: &str, page: u32) -> String {
    let text: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("/search?text={}&page={}", text, page)
}

/// Spec sub-page of a product: `<product url>/spec`
pub fn spec_url(product_url: &str) -> String {
    match Url::parse(product_url) {
        Ok(mut url) => {
            let path = format!("{}/spec", url.path().trim_end_matches('/'));
            url.set_path(&path);
            url.to_string()
        }
        Err(_) => format!("{}/spec", product_url.trim_end_matches('/')),
    }
}
