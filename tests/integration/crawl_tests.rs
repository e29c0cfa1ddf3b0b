//! Integration tests for the harvester
//!
//! These tests use wiremock servers as both the proxy listing site and the
//! HTTP proxies themselves. The target site lives at `http://market.invalid`,
//! so every market request reaches a mock server only by going through the
//! leased proxy.

use market_harvester::config::parse_config;
use market_harvester::{CrawlPipeline, ProductSink};
use std::net::SocketAddr;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches requests whose full URL ends with the given suffix
///
/// Proxied requests arrive in absolute form, so the suffix is checked against
/// the whole URL rather than a parsed path.
struct UrlEndsWith(String);

impl Match for UrlEndsWith {
    fn matches(&self, request: &Request) -> bool {
        request.url.as_str().ends_with(&self.0)
    }
}

fn target(suffix: &str) -> UrlEndsWith {
    UrlEndsWith(suffix.to_string())
}

fn listing(cards: &[(u32, Option<&str>)]) -> String {
    let cards: String = cards
        .iter()
        .map(|(id, rating)| {
            let rating = rating
                .map(|r| format!(r#"<div class="rating">{}</div>"#, r))
                .unwrap_or_default();
            format!(
                r#"<div class="snippet-card">
                    <img class="image" src="//img.market.invalid/thumb/{id}.jpg?size=200">
                    <a class="snippet-card__header-link" href="/product/{id}?hid=91013">Laptop {id}</a>
                    <a class="snippet-card__subheader-link" href="/catalog/laptops?hid=91013">Ноутбуки</a>
                    {rating}
                    <div class="price">{id}9 990 ₽</div>
                    <span class="price">{id}4 500 ₽</span>
                    <ul class="snippet-card__desc"><li>13.3"</li></ul>
                </div>"#,
                id = id,
                rating = rating
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="filter-applied-results">{}</div></body></html>"#,
        cards
    )
}

fn detail(id: u32) -> String {
    format!(
        r#"<html><body><div class="product-gallery"><img data-original="//img.market.invalid/orig/{}.jpg"></div></body></html>"#,
        id
    )
}

fn spec(id: u32) -> String {
    format!(
        r#"<html><body>
        <dl class="product-spec"><dt class="product-spec__name">Модель</dt><dd class="product-spec__value">Laptop {}</dd></dl>
        <dl class="product-spec"><dt class="product-spec__name">Вес</dt><dd class="product-spec__value">1.3 кг</dd></dl>
        </body></html>"#,
        id
    )
}

async fn mount_page(server: &MockServer, suffix: &str, body: String) {
    Mock::given(method("GET"))
        .and(target(suffix))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Two listing pages: three items (the second without a rating), then two
async fn mount_market(server: &MockServer) {
    mount_page(
        server,
        "/search?text=laptop&page=1",
        listing(&[(1, Some("4.5")), (2, None), (3, Some("3,9"))]),
    )
    .await;
    mount_page(
        server,
        "/search?text=laptop&page=2",
        listing(&[(4, Some("5")), (5, Some("4.1"))]),
    )
    .await;

    for id in 1..=5 {
        mount_page(server, &format!("/product/{}", id), detail(id)).await;
        mount_page(server, &format!("/product/{}/spec", id), spec(id)).await;
    }
}

/// Serves a proxy table listing `proxies` in order
async fn proxy_list(proxies: &[SocketAddr]) -> MockServer {
    let server = MockServer::start().await;
    let rows: String = proxies
        .iter()
        .map(|addr| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>RU</td><td>elite proxy</td></tr>",
                addr.ip(),
                addr.port()
            )
        })
        .collect();
    let body = format!(
        r#"<html><body><table id="proxylisttable"><thead><tr><th>IP Address</th><th>Port</th></tr></thead><tbody>{}</tbody></table></body></html>"#,
        rows
    );

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    server
}

fn config_toml(list_url: &str, products_path: &str) -> String {
    format!(
        r#"
[target]
base-url = "http://market.invalid"
query = "laptop"
pages = 2

[proxy]
list-url = "{list_url}"
refill-wait-secs = 0
max-refill-rounds = 1

[identity]
user-agents = ["Agent/1", "Agent/2"]
accept-language = "ru-RU"
rate-limit-pause-secs = 0
request-timeout-secs = 5

[pacing]
politeness-min-ms = 0
politeness-max-ms = 0

[retry]
soft-block-jitter-secs = 0
proxy-failure-jitter-secs = 0
transient-jitter-secs = 0
max-attempts = 4

[output]
products-path = "{products_path}"
"#,
        list_url = list_url,
        products_path = products_path
    )
}

async fn listing_requests(server: &MockServer, page: u32) -> usize {
    let suffix = format!("/search?text=laptop&page={}", page);
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.as_str().ends_with(&suffix))
        .count()
}

#[tokio::test]
async fn test_full_harvest_through_proxy() {
    let market = MockServer::start().await;
    mount_market(&market).await;
    let list = proxy_list(&[*market.address()]).await;

    let dir = TempDir::new().unwrap();
    let products_path = dir.path().join("products.json");
    let config = parse_config(&config_toml(
        &format!("{}/", list.uri()),
        &products_path.display().to_string(),
    ))
    .unwrap();

    let mut pipeline = CrawlPipeline::from_config(&config).await.unwrap();
    pipeline.run().await.unwrap();

    let products = pipeline.sink().products();
    let names: Vec<_> = products.iter().map(|p| p.preview.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Laptop 1", "Laptop 2", "Laptop 3", "Laptop 4", "Laptop 5"]
    );

    // The rating-less item keeps every other field
    let second = &products[1].preview;
    assert_eq!(second.rating, None);
    assert_eq!(second.min_price, Some(29_990));
    assert_eq!(second.max_price, Some(24_500));
    assert_eq!(
        second.product_url.as_deref(),
        Some("http://market.invalid/product/2")
    );
    assert_eq!(second.category.as_deref(), Some("Ноутбуки"));
    assert_eq!(
        second.category_url.as_deref(),
        Some("http://market.invalid/catalog/laptops")
    );
    assert_eq!(
        second.thumbnail_url.as_deref(),
        Some("http://img.market.invalid/thumb/2.jpg?size=200")
    );
    assert_eq!(second.short_description, Some(vec!["13.3\"".to_string()]));

    assert_eq!(products[2].preview.rating, Some(3.9));
    assert_eq!(products[3].preview.rating, Some(5.0));

    let info = products[4].full_info.as_ref().unwrap();
    assert_eq!(
        info.original_images,
        vec!["http://img.market.invalid/orig/5.jpg".to_string()]
    );
    assert_eq!(info.specs["Модель"], "Laptop 5");
    assert_eq!(info.specs["Вес"], "1.3 кг");

    assert_eq!(listing_requests(&market, 1).await, 1);
    assert_eq!(listing_requests(&market, 2).await, 1);
    assert_eq!(pipeline.stats().pages_fetched, 2);
    assert_eq!(pipeline.stats().products_with_full_info, 5);
}

#[tokio::test]
async fn test_persisted_snapshot_matches_accumulation() {
    let market = MockServer::start().await;
    mount_market(&market).await;
    let list = proxy_list(&[*market.address()]).await;

    let dir = TempDir::new().unwrap();
    let products_path = dir.path().join("products.json");
    let config = parse_config(&config_toml(
        &format!("{}/", list.uri()),
        &products_path.display().to_string(),
    ))
    .unwrap();

    let mut pipeline = CrawlPipeline::from_config(&config).await.unwrap();
    pipeline.run().await.unwrap();
    let sink = pipeline.into_sink();
    sink.persist(&products_path).unwrap();

    let loaded = ProductSink::load(&products_path).unwrap();
    assert_eq!(loaded, sink);
    assert_eq!(loaded.len(), 5);
}

#[tokio::test]
async fn test_captcha_moves_to_a_fresh_proxy() {
    let blocked = MockServer::start().await;
    let fresh = MockServer::start().await;

    // The first proxy's exit is flagged: page 1 lands on the CAPTCHA page
    Mock::given(method("GET"))
        .and(target("/search?text=laptop&page=1"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "http://market.invalid/showcaptcha?retpath=1"),
        )
        .with_priority(1)
        .mount(&blocked)
        .await;
    mount_page(&blocked, "/showcaptcha?retpath=1", "<html>captcha</html>".to_string()).await;

    mount_market(&fresh).await;

    let list = proxy_list(&[*blocked.address(), *fresh.address()]).await;
    let dir = TempDir::new().unwrap();
    let config = parse_config(&config_toml(
        &format!("{}/", list.uri()),
        &dir.path().join("products.json").display().to_string(),
    ))
    .unwrap();

    let mut pipeline = CrawlPipeline::from_config(&config).await.unwrap();
    let first_agent = pipeline.identity().user_agent.clone();
    pipeline.run().await.unwrap();

    assert_eq!(pipeline.sink().len(), 5);
    assert_eq!(pipeline.context().identity_rotations(), 1);
    assert_eq!(pipeline.identity().proxy.port(), fresh.address().port());
    assert_ne!(pipeline.identity().user_agent, first_agent);

    // Page 1 was asked once through each proxy and never skipped
    assert_eq!(listing_requests(&blocked, 1).await, 1);
    assert_eq!(listing_requests(&fresh, 1).await, 1);
    assert_eq!(listing_requests(&blocked, 2).await, 0);
}

#[tokio::test]
async fn test_dead_proxy_is_replaced() {
    let market = MockServer::start().await;
    mount_market(&market).await;

    // Nothing listens on port 1: the first lease fails at connect time
    let dead: SocketAddr = "127.0.0.1:1".parse().unwrap();
    let list = proxy_list(&[dead, *market.address()]).await;

    let dir = TempDir::new().unwrap();
    let config = parse_config(&config_toml(
        &format!("{}/", list.uri()),
        &dir.path().join("products.json").display().to_string(),
    ))
    .unwrap();

    let mut pipeline = CrawlPipeline::from_config(&config).await.unwrap();
    assert_eq!(pipeline.identity().proxy.port(), 1);
    let first_agent = pipeline.identity().user_agent.clone();

    pipeline.run().await.unwrap();

    assert_eq!(pipeline.sink().len(), 5);
    assert_eq!(pipeline.context().proxy_rotations(), 1);
    assert_eq!(pipeline.context().identity_rotations(), 0);
    assert_eq!(pipeline.identity().user_agent, first_agent);
    assert_eq!(pipeline.identity().proxy.port(), market.address().port());
}
