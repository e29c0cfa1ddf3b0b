use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A proxy endpoint in `host:port` form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    host: String,
    port: u16,
}

/// Reasons a string is not a usable endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("Missing host in proxy endpoint '{0}'")]
    MissingHost(String),

    #[error("Invalid port in proxy endpoint '{0}'")]
    InvalidPort(String),
}

impl ProxyEndpoint {
    /// Builds an endpoint from the two cells of a proxy listing row
    pub fn from_parts(host: &str, port: &str) -> Result<Self, EndpointError> {
        let host = host.trim();
        let port_text = port.trim();
        let raw = format!("{}:{}", host, port_text);

        if host.is_empty() || host.contains(char::is_whitespace) || host.contains('/') {
            return Err(EndpointError::MissingHost(raw));
        }

        let port = port_text
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or(EndpointError::InvalidPort(raw))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The URL handed to the HTTP client as its proxy
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl FromStr for ProxyEndpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().rsplit_once(':') {
            Some((host, port)) => Self::from_parts(host, port),
            None => Err(EndpointError::InvalidPort(s.to_string())),
        }
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        let endpoint: ProxyEndpoint = "10.0.0.1:8080".parse().unwrap();
        assert_eq!(endpoint.host(), "10.0.0.1");
        assert_eq!(endpoint.port(), 8080);
        assert_eq!(endpoint.to_string(), "10.0.0.1:8080");
        assert_eq!(endpoint.proxy_url(), "http://10.0.0.1:8080");
    }

    #[test]
    fn test_from_parts_trims_cells() {
        let endpoint = ProxyEndpoint::from_parts(" 10.0.0.2 ", " 3128\n").unwrap();
        assert_eq!(endpoint.to_string(), "10.0.0.2:3128");
    }

    #[test]
    fn test_reject_malformed_endpoints() {
        assert!(matches!(
            "10.0.0.1".parse::<ProxyEndpoint>(),
            Err(EndpointError::InvalidPort(_))
        ));
        assert!(matches!(
            ProxyEndpoint::from_parts("", "80"),
            Err(EndpointError::MissingHost(_))
        ));
        assert!(matches!(
            ProxyEndpoint::from_parts("10.0.0.1", "Port"),
            Err(EndpointError::InvalidPort(_))
        ));
        assert!(ProxyEndpoint::from_parts("10.0.0.1", "70000").is_err());
        assert!(ProxyEndpoint::from_parts("10.0.0.1", "0").is_err());
    }
}
