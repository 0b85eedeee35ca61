//! One-shot job recomputing the aggregate tables from raw events.
//! Meant to be run on a schedule; exits non-zero when any refresh fails.

use std::process::ExitCode;

use envconfig::Envconfig;
use event_store::{ClickHouseConfig, ClickHouseStore};
use tracing::{error, info};

#[derive(Envconfig)]
struct Config {
    #[envconfig(nested = true)]
    clickhouse: ClickHouseConfig,

    #[envconfig(default = "90")]
    aggregate_days_back: u32,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let config = match Config::init_from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let store = ClickHouseStore::new(&config.clickhouse);
    let result = match store.ensure_schema().await {
        Ok(()) => store.refresh_aggregates(config.aggregate_days_back).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => {
            info!(
                days_back = config.aggregate_days_back,
                "aggregates refreshed"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("aggregate refresh failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
