use url::Url;

/// Link policy shared by every extracted URL
///
/// Relative links are resolved against the site's base URL. Links that point
/// at the site's click-redirector are dropped rather than followed.
#[derive(Debug, Clone)]
pub struct LinkPolicy {
    base_url: Url,
    redirector_marker: String,
}

impl LinkPolicy {
    pub fn new(base_url: Url, redirector_marker: impl Into<String>) -> Self {
        Self {
            base_url,
            redirector_marker: redirector_marker.into(),
        }
    }

    /// Resolves an href to an absolute URL, keeping its query
    pub fn resolve(&self, href: &str) -> Option<String> {
        let absolute = resolve_link(href, &self.base_url)?;
        if is_redirector(&absolute, &self.redirector_marker) {
            return None;
        }
        Some(absolute)
    }

    /// Resolves an href and strips its query, for product and category links
    pub fn resolve_clean(&self, href: &str) -> Option<String> {
        let absolute = resolve_link(href, &self.base_url)?;
        clean_url(&absolute, &self.redirector_marker)
    }
}

/// Strips query and fragment from a URL
///
/// Returns None for unparseable URLs and for anything containing the
/// redirector marker.
///
/// # Example
///
/// ```
/// use market_harvester::extract::clean_url;
///
/// assert_eq!(clean_url("http://x/y?z=1", "market-click"), Some("http://x/y".to_string()));
/// assert_eq!(clean_url("https://market-click2.example/redir?to=x", "market-click"), None);
/// ```
pub fn clean_url(url: &str, redirector_marker: &str) -> Option<String> {
    if is_redirector(url, redirector_marker) {
        return None;
    }

    let mut parsed = Url::parse(url).ok()?;
    parsed.set_query(None);
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

/// Returns true if the URL goes through the site's click-redirector
pub fn is_redirector(url: &str, redirector_marker: &str) -> bool {
    !redirector_marker.is_empty() && url.contains(redirector_marker)
}

/// Resolves an href against the base URL
///
/// Returns None for empty hrefs, fragment-only links, `javascript:`,
/// `mailto:`, `tel:` and `data:` links, and anything that does not end up
/// as HTTP(S).
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute.to_string())
    } else {
        None
    }
}
