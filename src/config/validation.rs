use crate::config::types::{
    Config, DownloaderConfig, EngineConfig, MetadataConfig, RetryConfig, StorageConfig,
};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_downloader_config(&config.downloader)?;
    validate_engine_config(&config.engine)?;
    validate_retry_config(&config.retry)?;
    validate_storage_config(&config.storage)?;
    validate_metadata_config(&config.metadata)?;
    Ok(())
}

/// Validates downloader configuration
fn validate_downloader_config(config: &DownloaderConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    // Header values must be visible ASCII
    for (name, value) in [("user-agent", &config.user_agent), ("accept", &config.accept)] {
        if !value.chars().all(|c| c == ' ' || c.is_ascii_graphic()) {
            return Err(ConfigError::Validation(format!(
                "{} must contain only printable ASCII characters, got '{}'",
                name, value
            )));
        }
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_redirects > 50 {
        return Err(ConfigError::Validation(format!(
            "max-redirects must be <= 50, got {}",
            config.max_redirects
        )));
    }

    Ok(())
}

/// Validates engine configuration
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.max_urls == Some(0) {
        return Err(ConfigError::Validation(
            "max-urls must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if !config.multiplier.is_finite() || config.multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "multiplier must be a finite number >= 1.0, got {}",
            config.multiplier
        )));
    }

    if config.max_backoff_ms < config.backoff_ms {
        return Err(ConfigError::Validation(format!(
            "max-backoff-ms ({}) must be >= backoff-ms ({})",
            config.max_backoff_ms, config.backoff_ms
        )));
    }

    Ok(())
}

/// Validates object store configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.root.is_empty() {
        return Err(ConfigError::Validation("root cannot be empty".to_string()));
    }

    if let Some(suffix) = &config.suffix {
        validate_suffix(suffix)?;
    }

    if config.list_page_size == 0 {
        return Err(ConfigError::Validation(
            "list-page-size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates metadata store configuration
fn validate_metadata_config(config: &MetadataConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a key namespace segment
pub(crate) fn validate_suffix(suffix: &str) -> Result<(), ConfigError> {
    if suffix.is_empty() {
        return Err(ConfigError::Validation(
            "suffix cannot be empty when set".to_string(),
        ));
    }

    if suffix.starts_with('/') || suffix.ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "suffix '{}' cannot start or end with '/'",
            suffix
        )));
    }

    if suffix.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(ConfigError::Validation(format!(
            "suffix '{}' contains an empty or relative segment",
            suffix
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_suffix() {
        assert!(validate_suffix("prod").is_ok());
        assert!(validate_suffix("env/staging").is_ok());

        assert!(validate_suffix("").is_err());
        assert!(validate_suffix("/prod").is_err());
        assert!(validate_suffix("prod/").is_err());
        assert!(validate_suffix("a//b").is_err());
        assert!(validate_suffix("../escape").is_err());
    }

    #[test]
    fn test_validate_downloader_config() {
        let mut config = DownloaderConfig::new("crawline/1.0");
        assert!(validate_downloader_config(&config).is_ok());

        config.user_agent = "   ".to_string();
        assert!(validate_downloader_config(&config).is_err());

        let mut config = DownloaderConfig::new("crawline/1.0");
        config.timeout_secs = 0;
        assert!(validate_downloader_config(&config).is_err());

        let mut config = DownloaderConfig::new("crawline/1.0");
        config.max_redirects = 51;
        assert!(validate_downloader_config(&config).is_err());

        let config = DownloaderConfig::new("crawline/1.0\n");
        assert!(validate_downloader_config(&config).is_err());
    }

    #[test]
    fn test_messages_name_keys_as_written_in_toml() {
        let content = r#"
[downloader]
user-agent = "crawline/1.0"
timeout-secs = 0

[storage]
root = "/tmp/crawline"

[metadata]
database-path = "/tmp/crawline.db"
"#;
        match crate::config::parse_config(content) {
            Err(ConfigError::Validation(message)) => {
                assert!(message.starts_with("timeout-secs"), "{}", message)
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let mut config = DownloaderConfig::new("crawline/1.0");
        config.connect_timeout_secs = 0;
        match validate_downloader_config(&config) {
            Err(ConfigError::Validation(message)) => {
                assert!(message.starts_with("connect-timeout-secs"), "{}", message)
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_retry_config() {
        let mut config = RetryConfig::default();
        assert!(validate_retry_config(&config).is_ok());

        config.multiplier = 0.5;
        assert!(validate_retry_config(&config).is_err());

        config.multiplier = f64::NAN;
        assert!(validate_retry_config(&config).is_err());

        config.multiplier = 2.0;
        config.max_backoff_ms = config.backoff_ms - 1;
        match validate_retry_config(&config) {
            Err(ConfigError::Validation(message)) => assert!(message.contains("max-backoff-ms")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_engine_config() {
        let mut config = EngineConfig::default();
        assert!(validate_engine_config(&config).is_ok());

        config.max_urls = Some(0);
        assert!(validate_engine_config(&config).is_err());
    }
}
