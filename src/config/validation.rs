use crate::config::types::{
    Config, IdentityConfig, OutputConfig, PacingConfig, ProxyConfig, RetryConfig, TargetConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target_config(&config.target)?;
    validate_proxy_config(&config.proxy)?;
    validate_identity_config(&config.identity)?;
    validate_pacing_config(&config.pacing)?;
    validate_retry_config(&config.retry)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the harvested site configuration
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    validate_http_url("base_url", &config.base_url)?;

    if config.query.trim().is_empty() {
        return Err(ConfigError::Validation("query cannot be empty".to_string()));
    }

    if config.pages < 1 {
        return Err(ConfigError::Validation(format!(
            "pages must be >= 1, got {}",
            config.pages
        )));
    }

    if config.captcha_marker.is_empty() {
        return Err(ConfigError::Validation(
            "captcha_marker cannot be empty".to_string(),
        ));
    }

    if config.redirector_marker.is_empty() {
        return Err(ConfigError::Validation(
            "redirector_marker cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the proxy source configuration
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    validate_http_url("list_url", &config.list_url)?;

    if config.max_refill_rounds == Some(0) {
        return Err(ConfigError::Validation(
            "max_refill_rounds must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the identity configuration
fn validate_identity_config(config: &IdentityConfig) -> Result<(), ConfigError> {
    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "user_agents must contain at least one entry".to_string(),
        ));
    }

    if let Some(position) = config.user_agents.iter().position(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "user_agents[{}] cannot be empty",
            position
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_pacing_config(config: &PacingConfig) -> Result<(), ConfigError> {
    if config.politeness_min_ms > config.politeness_max_ms {
        return Err(ConfigError::Validation(format!(
            "politeness_min_ms ({}) must not exceed politeness_max_ms ({})",
            config.politeness_min_ms, config.politeness_max_ms
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts == Some(0) {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.products_path.is_empty() {
        return Err(ConfigError::Validation(
            "products_path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.log_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "log_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a URL parses and uses an HTTP(S) scheme
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
