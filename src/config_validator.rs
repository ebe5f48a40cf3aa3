use thiserror::Error;

use crate::config::Config;
use crate::rate_limiter::MAX_SWEEP_INTERVAL;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_port(config.port)?;
        Self::validate_environment(&config.env)?;
        Self::validate_dsn(&config.db_dsn)?;
        Self::validate_rate_limit(config.limiter_rps, config.limiter_burst)?;
        Self::validate_sweep(
            config.limiter_sweep_interval_secs,
            config.limiter_staleness_multiplier,
        )?;
        Self::validate_request_timeout(config.request_timeout_secs)?;
        Ok(())
    }

    pub fn validate_port(port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError("Server port must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Only SQLite DSNs are supported
    pub fn validate_dsn(dsn: &str) -> Result<(), ConfigError> {
        if dsn.is_empty() {
            return Err(ConfigError("Database DSN cannot be empty".to_string()));
        }

        if !dsn.starts_with("sqlite:") {
            return Err(ConfigError("Database DSN must start with 'sqlite:'".to_string()));
        }

        Ok(())
    }

    /// Validates rate limit parameters
    pub fn validate_rate_limit(rps: f64, burst: u32) -> Result<(), ConfigError> {
        if !rps.is_finite() || rps <= 0.0 {
            return Err(ConfigError(
                "Rate limiter requests per second must be a positive number".to_string(),
            ));
        }

        if burst == 0 {
            return Err(ConfigError(
                "Rate limiter burst must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_sweep(interval_secs: u64, staleness_multiplier: u32) -> Result<(), ConfigError> {
        if interval_secs == 0 {
            return Err(ConfigError("Sweep interval must be greater than 0".to_string()));
        }
        if interval_secs > MAX_SWEEP_INTERVAL.as_secs() {
            return Err(ConfigError(format!(
                "Sweep interval must be at most {} seconds",
                MAX_SWEEP_INTERVAL.as_secs()
            )));
        }
        if staleness_multiplier == 0 {
            return Err(ConfigError("Staleness multiplier must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn validate_request_timeout(timeout_secs: u64) -> Result<(), ConfigError> {
        if timeout_secs == 0 {
            return Err(ConfigError("Request timeout must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Validates environment name
    pub fn validate_environment(env: &str) -> Result<(), ConfigError> {
        let valid_envs = ["development", "staging", "production", "test"];
        if !valid_envs.contains(&env.to_lowercase().as_str()) {
            return Err(ConfigError(format!(
                "Invalid environment '{}'. Must be one of: {:?}",
                env, valid_envs
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigValidator::validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_dsn() {
        assert!(ConfigValidator::validate_dsn("").is_err());
        assert!(ConfigValidator::validate_dsn("postgres://localhost/greenlight").is_err());
        assert!(ConfigValidator::validate_dsn("sqlite::memory:").is_ok());
    }

    #[test]
    fn test_valid_rate_limit() {
        assert!(ConfigValidator::validate_rate_limit(2.0, 4).is_ok());
        assert!(ConfigValidator::validate_rate_limit(0.5, 1).is_ok());
    }

    #[test]
    fn test_invalid_rate_limit() {
        assert!(ConfigValidator::validate_rate_limit(0.0, 4).is_err());
        assert!(ConfigValidator::validate_rate_limit(-1.0, 4).is_err());
        assert!(ConfigValidator::validate_rate_limit(f64::NAN, 4).is_err());
        assert!(ConfigValidator::validate_rate_limit(2.0, 0).is_err());
    }

    #[test]
    fn test_invalid_sweep() {
        assert!(ConfigValidator::validate_sweep(0, 3).is_err());
        assert!(ConfigValidator::validate_sweep(60, 0).is_err());
        assert!(ConfigValidator::validate_sweep(86_400, u32::MAX).is_ok());
        assert!(ConfigValidator::validate_sweep(86_401, 3).is_err());
        assert!(ConfigValidator::validate_sweep(u64::MAX, 3).is_err());
    }

    #[test]
    fn test_zero_request_timeout() {
        assert!(ConfigValidator::validate_request_timeout(0).is_err());
        assert!(ConfigValidator::validate_request_timeout(30).is_ok());
    }

    #[test]
    fn test_environment() {
        assert!(ConfigValidator::validate_environment("development").is_ok());
        assert!(ConfigValidator::validate_environment("Production").is_ok());
        assert!(ConfigValidator::validate_environment("invalid").is_err());
    }

    #[test]
    fn test_zero_port() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
