//! Proxy listing source and table parser
//!
//! The listing site publishes an HTML table (`table#proxylisttable`) whose rows
//! start with the proxy's IP and port.

use crate::proxy::ProxyEndpoint;
use crate::Failure;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;

/// Where fresh proxy endpoints come from
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Fetches the raw listing page
    async fn fetch_listing(&self) -> Result<String, Failure>;
}

/// Fetches the listing page over plain HTTP, without any proxy
pub struct HttpProxySource {
    client: Client,
    list_url: String,
}

impl HttpProxySource {
    pub fn new(list_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .no_proxy()
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            list_url: list_url.into(),
        })
    }
}

#[async_trait]
impl ProxySource for HttpProxySource {
    async fn fetch_listing(&self) -> Result<String, Failure> {
        let response = self.client.get(&self.list_url).send().await.map_err(|e| {
            Failure::transient(format!("proxy listing {} unreachable: {}", self.list_url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Failure::transient(format!(
                "proxy listing {} returned HTTP {}",
                self.list_url,
                status.as_u16()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Failure::transient(format!("proxy listing body unreadable: {}", e)))
    }
}

/// Parses the proxy table into endpoints, in row order
///
/// Rows without `td` cells (header rows) are skipped, as are rows whose first
/// two cells do not form a valid `host:port`. A page without the table fails
/// as [`Transient`](crate::FailureCategory::Transient).
pub fn parse_proxy_table(html: &str) -> Result<Vec<ProxyEndpoint>, Failure> {
    let document = Html::parse_document(html);

    let table_selector = selector("table#proxylisttable")?;
    let row_selector = selector("tbody tr")?;
    let cell_selector = selector("td")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| Failure::transient("proxy listing has no proxylisttable table"))?;

    let mut endpoints = Vec::new();
    for row in table.select(&row_selector) {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|cell| cell.text().collect::<String>())
            .collect();

        if cells.len() < 2 {
            continue;
        }

        match ProxyEndpoint::from_parts(&cells[0], &cells[1]) {
            Ok(endpoint) => endpoints.push(endpoint),
            Err(e) => tracing::debug!("Skipping proxy row: {}", e),
        }
    }

    Ok(endpoints)
}

fn selector(css: &str) -> Result<Selector, Failure> {
    Selector::parse(css).map_err(|e| Failure::fatal(format!("invalid selector '{}': {:?}", css, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureCategory;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"
        <html><body>
        <table id="proxylisttable">
          <thead><tr><th>IP Address</th><th>Port</th><th>Code</th></tr></thead>
          <tbody>
            <tr><td>10.0.0.1</td><td>8080</td><td>RU</td></tr>
            <tr><td>10.0.0.2</td><td>3128</td><td>DE</td></tr>
            <tr><td>broken</td><td>port</td><td>??</td></tr>
            <tr></tr>
            <tr><td>10.0.0.3</td><td>80</td><td>US</td></tr>
          </tbody>
        </table>
        </body></html>
    "#;

    fn hosts(endpoints: &[ProxyEndpoint]) -> Vec<String> {
        endpoints.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_parse_rows_in_order() {
        let endpoints = parse_proxy_table(LISTING).unwrap();
        assert_eq!(
            hosts(&endpoints),
            vec!["10.0.0.1:8080", "10.0.0.2:3128", "10.0.0.3:80"]
        );
    }

    #[test]
    fn test_missing_table_is_transient() {
        let failure = parse_proxy_table("<html><body><p>maintenance</p></body></html>")
            .unwrap_err();
        assert_eq!(failure.category, FailureCategory::Transient);
    }

    #[test]
    fn test_other_tables_are_ignored() {
        let html = r#"<table id="other"><tr><td>10.9.9.9</td><td>1</td></tr></table>
                      <table id="proxylisttable"><tr><td>10.0.0.7</td><td>8000</td></tr></table>"#;
        let endpoints = parse_proxy_table(html).unwrap();
        assert_eq!(hosts(&endpoints), vec!["10.0.0.7:8000"]);
    }

    #[tokio::test]
    async fn test_http_source_fetches_listing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&mock_server)
            .await;

        let source =
            HttpProxySource::new(format!("{}/", mock_server.uri()), Duration::from_secs(5))
                .unwrap();
        let body = source.fetch_listing().await.unwrap();

        assert_eq!(parse_proxy_table(&body).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_http_source_error_status_is_transient() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let source = HttpProxySource::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        let failure = source.fetch_listing().await.unwrap_err();

        assert_eq!(failure.category, FailureCategory::Transient);
        assert!(failure.message.contains("503"));
    }
}
