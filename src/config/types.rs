use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Market-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    pub proxy: ProxyConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub output: OutputConfig,
}

/// The site being harvested
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Base URL every relative endpoint and link is resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Search text sent as `/search?text=<query>`
    pub query: String,

    /// Number of listing pages to walk
    pub pages: u32,

    /// Substring of the final URL that signals a CAPTCHA page
    #[serde(rename = "captcha-marker", default = "default_captcha_marker")]
    pub captcha_marker: String,

    /// Substring identifying the site's internal click-redirector links
    #[serde(rename = "redirector-marker", default = "default_redirector_marker")]
    pub redirector_marker: String,
}

/// Where proxies come from and how long to wait when they run out
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Page carrying the `proxylisttable` table
    #[serde(rename = "list-url")]
    pub list_url: String,

    /// Pause before refilling an empty pool (seconds)
    #[serde(rename = "refill-wait-secs", default = "default_five_minutes")]
    pub refill_wait_secs: u64,

    /// Give up after this many empty wait/refill rounds; unbounded when absent
    #[serde(rename = "max-refill-rounds", default)]
    pub max_refill_rounds: Option<u32>,
}

/// Identity presented to the target site
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Candidate user agents; one is picked at every identity rotation
    #[serde(rename = "user-agents")]
    pub user_agents: Vec<String>,

    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,

    /// Pause after an HTTP 429 (seconds)
    #[serde(rename = "rate-limit-pause-secs", default = "default_five_minutes")]
    pub rate_limit_pause_secs: u64,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Politeness delay applied between listing pages
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    #[serde(rename = "politeness-min-ms", default = "default_politeness_min")]
    pub politeness_min_ms: u64,

    #[serde(rename = "politeness-max-ms", default = "default_politeness_max")]
    pub politeness_max_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            politeness_min_ms: default_politeness_min(),
            politeness_max_ms: default_politeness_max(),
        }
    }
}

impl PacingConfig {
    pub fn politeness_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.politeness_min_ms),
            Duration::from_millis(self.politeness_max_ms),
        )
    }
}

/// Upper bounds of the jitter slept before each retry
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "soft-block-jitter-secs", default = "default_small_jitter")]
    pub soft_block_jitter_secs: u64,

    #[serde(rename = "proxy-failure-jitter-secs", default = "default_small_jitter")]
    pub proxy_failure_jitter_secs: u64,

    #[serde(rename = "transient-jitter-secs", default = "default_transient_jitter")]
    pub transient_jitter_secs: u64,

    /// Stop retrying one operation after this many attempts; unbounded when absent
    #[serde(rename = "max-attempts", default)]
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            soft_block_jitter_secs: default_small_jitter(),
            proxy_failure_jitter_secs: default_small_jitter(),
            transient_jitter_secs: default_transient_jitter(),
            max_attempts: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the JSON product snapshot
    #[serde(rename = "products-path")]
    pub products_path: String,

    /// Optional log file, written in addition to the console
    #[serde(rename = "log-path", default)]
    pub log_path: Option<String>,
}

fn default_captcha_marker() -> String {
    "showcaptcha".to_string()
}

fn default_redirector_marker() -> String {
    "market-click".to_string()
}

fn default_accept_language() -> String {
    "ru-RU,ru;q=0.8,en-US;q=0.6,en;q=0.4".to_string()
}

fn default_five_minutes() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    30
}

fn default_politeness_min() -> u64 {
    2_000
}

fn default_politeness_max() -> u64 {
    8_000
}

fn default_small_jitter() -> u64 {
    10
}

fn default_transient_jitter() -> u64 {
    60
}
