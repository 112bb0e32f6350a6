use super::{types::Config, ConfigError};
use crate::ladder::validate_specs;

/// Validate configuration
///
/// Rejects zero ceilings, a negative gain limit, zero timeout or cache
/// capacity, and ladder overrides that are empty or not monotonic.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let n = &config.normalizer;

    if n.size_ceiling_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "normalizer.size_ceiling_bytes cannot be 0".to_string(),
        ));
    }
    if n.duration_ceiling_secs == 0 {
        return Err(ConfigError::ValidationError(
            "normalizer.duration_ceiling_secs cannot be 0".to_string(),
        ));
    }
    if n.max_gain_db < 0.0 {
        return Err(ConfigError::ValidationError(
            "normalizer.max_gain_db cannot be negative".to_string(),
        ));
    }
    if n.passthrough_tolerance_db < 0.0 {
        return Err(ConfigError::ValidationError(
            "normalizer.passthrough_tolerance_db cannot be negative".to_string(),
        ));
    }
    if let Some(specs) = &n.ladder {
        validate_specs(specs)
            .map_err(|e| ConfigError::ValidationError(format!("normalizer.ladder: {}", e)))?;
    }

    if config.encoder.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "encoder.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.cache.enabled && config.cache.max_entries == 0 {
        return Err(ConfigError::ValidationError(
            "cache.max_entries cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::reference_specs;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_ceiling_fails() {
        let mut config = Config::default();
        config.normalizer.size_ceiling_bytes = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_negative_gain_fails() {
        let mut config = Config::default();
        config.normalizer.max_gain_db = -1.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_ladder_fails() {
        let mut config = Config::default();
        config.normalizer.ladder = Some(vec![]);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_non_monotonic_ladder_fails() {
        let mut specs = reference_specs();
        specs.swap(0, 2);
        let mut config = Config::default();
        config.normalizer.ladder = Some(specs);

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("normalizer.ladder"));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = Config::default();
        config.encoder.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_cache_capacity_fails() {
        let mut config = Config::default();
        config.cache.max_entries = 0;
        assert!(validate_config(&config).is_err());
    }
}
