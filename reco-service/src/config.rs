use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use envconfig::Envconfig;
use event_store::ClickHouseConfig;
use tracing::Level;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "0.0.0.0:50052")]
    pub address: SocketAddr,

    #[envconfig(nested = true)]
    pub clickhouse: ClickHouseConfig,

    /// Base URL of the content-metadata service.
    #[envconfig(default = "http://localhost:8080")]
    pub content_api_url: String,

    #[envconfig(default = "3000")]
    pub content_tags_timeout_ms: EnvMsDuration,

    #[envconfig(default = "5000")]
    pub content_search_timeout_ms: EnvMsDuration,

    #[envconfig(default = "5")]
    pub reco_cache_ttl_minutes: u32,

    #[envconfig(default = "true")]
    pub reco_cache_enabled: bool,

    #[envconfig(default = "100")]
    pub max_concurrent_requests: usize,

    // Disabled in integration tests, the recorder is process-global
    #[envconfig(default = "true")]
    pub export_prometheus: bool,

    pub otel_url: Option<String>,

    #[envconfig(default = "1.0")]
    pub otel_sampling_rate: f64,

    #[envconfig(default = "reco-service")]
    pub otel_service_name: String,

    #[envconfig(default = "info")]
    pub otel_log_level: Level,
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(Duration::from_millis(ms)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();

        assert_eq!(config.address.port(), 50052);
        assert_eq!(config.content_tags_timeout_ms.0, Duration::from_secs(3));
        assert_eq!(config.content_search_timeout_ms.0, Duration::from_secs(5));
        assert_eq!(config.reco_cache_ttl_minutes, 5);
        assert!(config.reco_cache_enabled);
    }

    #[test]
    fn cache_can_be_disabled() {
        let env = HashMap::from([
            ("RECO_CACHE_ENABLED".to_string(), "false".to_string()),
            ("RECO_CACHE_TTL_MINUTES".to_string(), "1".to_string()),
        ]);
        let config = Config::init_from_hashmap(&env).unwrap();

        assert!(!config.reco_cache_enabled);
        assert_eq!(config.reco_cache_ttl_minutes, 1);
    }
}
