use crate::config::types::{Config, CrawlerConfig, DriverConfig, DriverKind, LimitsConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_limits_config(&config.limits)?;
    validate_input_config(config)?;
    validate_output_config(&config.output)?;
    validate_driver_config(&config.driver)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.max_load_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_load_attempts must be >= 1, got {}",
            config.max_load_attempts
        )));
    }

    if config.page_load_timeout_ms == 0 || config.ready_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "page_load_timeout_ms and ready_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.scroll_max_iterations < 1 {
        return Err(ConfigError::Validation(format!(
            "scroll_max_iterations must be >= 1, got {}",
            config.scroll_max_iterations
        )));
    }

    if config.tick_interval_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "tick_interval_ms must be >= 10ms, got {}ms",
            config.tick_interval_ms
        )));
    }

    if let Some(prefix) = &config.allowed_prefix {
        validate_http_url(prefix, "allowed_prefix")?;
    }

    Ok(())
}

/// Validates resource ceilings
fn validate_limits_config(config: &LimitsConfig) -> Result<(), ConfigError> {
    if !(config.memory_limit_mb > 0.0) {
        return Err(ConfigError::Validation(format!(
            "memory_limit_mb must be > 0, got {}",
            config.memory_limit_mb
        )));
    }

    if !(config.cpu_limit_percent > 0.0) {
        return Err(ConfigError::Validation(format!(
            "cpu_limit_percent must be > 0, got {}",
            config.cpu_limit_percent
        )));
    }

    Ok(())
}

/// Validates input file settings
fn validate_input_config(config: &Config) -> Result<(), ConfigError> {
    if config.input.seeds_path.is_empty() {
        return Err(ConfigError::Validation(
            "seeds_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.log_path == config.visited_log_path {
        return Err(ConfigError::Validation(
            "log_path and visited_log_path must be different files".to_string(),
        ));
    }

    Ok(())
}

/// Validates the page driver section
fn validate_driver_config(config: &DriverConfig) -> Result<(), ConfigError> {
    if config.kind == DriverKind::Browser
        && config.chrome_executable.as_deref().is_some_and(str::is_empty)
    {
        return Err(ConfigError::Validation(
            "chrome_executable cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Checks that a setting holds an absolute http(s) URL
fn validate_http_url(value: &str, field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("https://docs.example.com/", "x").is_ok());
        assert!(validate_http_url("http://localhost:9515", "x").is_ok());

        assert!(validate_http_url("", "x").is_err());
        assert!(validate_http_url("ftp://example.com", "x").is_err());
        assert!(validate_http_url("not a url", "x").is_err());
    }

    #[test]
    fn test_default_crawler_config_is_valid() {
        assert!(validate_crawler_config(&CrawlerConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = CrawlerConfig {
            concurrency: 0,
            ..CrawlerConfig::default()
        };
        assert!(matches!(
            validate_crawler_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = CrawlerConfig {
            max_load_attempts: 0,
            ..CrawlerConfig::default()
        };
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_nan_memory_limit_rejected() {
        let limits = LimitsConfig {
            memory_limit_mb: f64::NAN,
            ..LimitsConfig::default()
        };
        assert!(validate_limits_config(&limits).is_err());
    }

    #[test]
    fn test_empty_chrome_executable_rejected() {
        let browser = DriverConfig {
            kind: DriverKind::Browser,
            chrome_executable: Some(String::new()),
            ..DriverConfig::default()
        };
        assert!(validate_driver_config(&browser).is_err());

        let detected = DriverConfig {
            chrome_executable: None,
            ..browser
        };
        assert!(validate_driver_config(&detected).is_ok());
    }
}
