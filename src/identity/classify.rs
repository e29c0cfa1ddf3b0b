use crate::identity::TransportError;
use crate::FailureCategory;

/// How a response that reached the site is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// HTTP 200 on a regular page
    Success,
    /// HTTP 200, but the final URL is the CAPTCHA page
    SoftBlock,
    /// HTTP 429
    RateLimited,
    /// Any other status
    Failed,
}

impl ResponseClass {
    /// The failure category for non-success classes
    pub fn failure_category(&self) -> Option<FailureCategory> {
        match self {
            Self::Success => None,
            Self::SoftBlock => Some(FailureCategory::SoftBlock),
            Self::RateLimited => Some(FailureCategory::RateLimited),
            Self::Failed => Some(FailureCategory::Transient),
        }
    }
}

/// Classifies a response by status code and final URL
///
/// | Condition | Class |
/// |-----------|-------|
/// | 200, final URL contains the CAPTCHA marker | SoftBlock |
/// | 200 | Success |
/// | 429 | RateLimited |
/// | anything else | Failed |
pub fn classify_response(status: u16, final_url: &str, captcha_marker: &str) -> ResponseClass {
    match status {
        200 if !captcha_marker.is_empty() && final_url.contains(captcha_marker) => {
            ResponseClass::SoftBlock
        }
        200 => ResponseClass::Success,
        429 => ResponseClass::RateLimited,
        _ => ResponseClass::Failed,
    }
}

/// Maps a transport error to its failure category
///
/// A session that cannot be built for an identity counts against the proxy,
/// so recovery moves on to the next endpoint.
pub fn classify_transport_error(error: &TransportError) -> FailureCategory {
    match error {
        TransportError::Proxy(_) | TransportError::Build(_) => FailureCategory::ProxyFailure,
        TransportError::Network(_) => FailureCategory::Transient,
    }
}
