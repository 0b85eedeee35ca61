use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use envconfig::Envconfig;
use event_store::ClickHouseConfig;
use tracing::Level;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "0.0.0.0:50051")]
    pub address: SocketAddr,

    #[envconfig(nested = true)]
    pub clickhouse: ClickHouseConfig,

    /// Maximum number of events written per flush.
    #[envconfig(default = "200")]
    pub batch_size: usize,

    #[envconfig(default = "1500")]
    pub batch_interval_ms: EnvMsDuration,

    /// Distinct event ids remembered for dedup before the window is reset.
    #[envconfig(default = "10000")]
    pub dedup_window_max: usize,

    #[envconfig(default = "100")]
    pub max_concurrent_requests: usize,

    // Disabled in integration tests, the recorder is process-global
    #[envconfig(default = "true")]
    pub export_prometheus: bool,

    pub otel_url: Option<String>,

    #[envconfig(default = "1.0")]
    pub otel_sampling_rate: f64,

    #[envconfig(default = "analytics-ingest")]
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
