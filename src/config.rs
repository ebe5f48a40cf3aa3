use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::data::PoolSettings;
use crate::rate_limiter::LimiterConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "greenlight", version, about = "Movie catalogue JSON API")]
pub struct Config {
    /// API server port
    #[arg(long, env = "GREENLIGHT_PORT", default_value_t = 4000)]
    pub port: u16,

    /// Environment (development|staging|production|test)
    #[arg(long, env = "GREENLIGHT_ENV", default_value = "development", value_parser = parse_env_name)]
    pub env: String,

    /// SQLite DSN
    #[arg(long, env = "GREENLIGHT_DB_DSN", default_value = "sqlite://greenlight.db?mode=rwc")]
    pub db_dsn: String,

    /// Maximum open database connections
    #[arg(long, env = "GREENLIGHT_DB_MAX_OPEN_CONNS", default_value_t = 25)]
    pub db_max_open_conns: u32,

    /// Seconds an idle database connection is kept
    #[arg(long, env = "GREENLIGHT_DB_MAX_IDLE_TIME", default_value_t = 900)]
    pub db_max_idle_time_secs: u64,

    /// Rate limiter maximum requests per second
    #[arg(long, env = "GREENLIGHT_LIMITER_RPS", default_value_t = 2.0)]
    pub limiter_rps: f64,

    /// Rate limiter maximum burst
    #[arg(long, env = "GREENLIGHT_LIMITER_BURST", default_value_t = 4)]
    pub limiter_burst: u32,

    /// Enable the rate limiter
    #[arg(long, env = "GREENLIGHT_LIMITER_ENABLED", default_value_t = true, action = ArgAction::Set)]
    pub limiter_enabled: bool,

    /// Seconds between sweeps of idle rate limiter clients
    #[arg(long, env = "GREENLIGHT_LIMITER_SWEEP_INTERVAL", default_value_t = 60)]
    pub limiter_sweep_interval_secs: u64,

    /// Idle sweep intervals after which a client is forgotten
    #[arg(long, env = "GREENLIGHT_LIMITER_STALENESS", default_value_t = 3)]
    pub limiter_staleness_multiplier: u32,

    /// Seconds in-flight requests get to finish on shutdown
    #[arg(long, env = "GREENLIGHT_DRAIN_DEADLINE", default_value_t = 5)]
    pub drain_deadline_secs: u64,

    /// Seconds a request may take before it is answered 408
    #[arg(long, env = "GREENLIGHT_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Trusted CORS origins (space separated)
    #[arg(long, env = "GREENLIGHT_CORS_TRUSTED_ORIGINS", value_delimiter = ' ', num_args = 0..)]
    pub cors_trusted_origins: Vec<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "GREENLIGHT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            env: "development".to_string(),
            db_dsn: "sqlite://greenlight.db?mode=rwc".to_string(),
            db_max_open_conns: 25,
            db_max_idle_time_secs: 900,
            limiter_rps: 2.0,
            limiter_burst: 4,
            limiter_enabled: true,
            limiter_sweep_interval_secs: 60,
            limiter_staleness_multiplier: 3,
            drain_deadline_secs: 5,
            request_timeout_secs: 30,
            cors_trusted_origins: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

fn parse_env_name(raw: &str) -> Result<String, std::convert::Infallible> {
    Ok(raw.trim().to_ascii_lowercase())
}

impl Config {
    /// Parse flags and `GREENLIGHT_*` environment variables
    pub fn from_env() -> Self {
        Config::parse()
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn limiter_config(&self) -> LimiterConfig {
        LimiterConfig {
            rate: self.limiter_rps,
            burst: self.limiter_burst,
            enabled: self.limiter_enabled,
            sweep_interval: Duration::from_secs(self.limiter_sweep_interval_secs),
            staleness_multiplier: self.limiter_staleness_multiplier,
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            dsn: self.db_dsn.clone(),
            max_open_conns: self.db_max_open_conns,
            max_idle_time: Duration::from_secs(self.db_max_idle_time_secs),
        }
    }

    pub fn drain_deadline(&self) -> Duration {
        Duration::from_secs(self.drain_deadline_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_development(&self) -> bool {
        self.env.eq_ignore_ascii_case("development")
    }

    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from([
            "greenlight",
            "--port",
            "8080",
            "--limiter-rps",
            "10.5",
            "--limiter-enabled",
            "false",
            "--cors-trusted-origins",
            "https://a.example https://b.example",
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.limiter_rps, 10.5);
        assert!(!config.limiter_enabled);
        assert_eq!(config.cors_trusted_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_limiter_config_view() {
        let limiter = Config::default().limiter_config();
        assert_eq!(limiter.rate, 2.0);
        assert_eq!(limiter.burst, 4);
        assert!(limiter.enabled);
        assert_eq!(limiter.staleness_threshold(), Duration::from_secs(180));
    }

    #[test]
    fn test_drain_deadline() {
        assert_eq!(Config::default().drain_deadline(), Duration::from_secs(5));
        assert_eq!(Config::default().request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_environment_name_is_case_insensitive() {
        let config = Config::try_parse_from(["greenlight", "--env", "Development"]).unwrap();
        assert_eq!(config.env, "development");
        assert!(config.is_development());

        let config = Config {
            env: "PRODUCTION".to_string(),
            ..Config::default()
        };
        assert!(config.is_production());
        assert!(!config.is_development());
    }
}
