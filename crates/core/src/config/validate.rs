use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - At least one indexer backend is configured
/// - Listing page size and supervisor concurrency are positive
/// - Runtime tolerance is a fraction in (0, 1]
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.indexer.radarr.is_none() && config.indexer.sonarr.is_none() {
        return Err(ConfigError::ValidationError(
            "at least one of indexer.radarr or indexer.sonarr must be configured".to_string(),
        ));
    }

    if config.object_store.page_size == 0 {
        return Err(ConfigError::ValidationError(
            "object_store.page_size must be greater than 0".to_string(),
        ));
    }

    if config.job.max_concurrent_titles == 0 {
        return Err(ConfigError::ValidationError(
            "job.max_concurrent_titles must be greater than 0".to_string(),
        ));
    }

    let tolerance = config.acquisition.runtime_tolerance;
    if !(tolerance > 0.0 && tolerance <= 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "acquisition.runtime_tolerance must be in (0, 1], got {tolerance}"
        )));
    }

    Ok(())
}
