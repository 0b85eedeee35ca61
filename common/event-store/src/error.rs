use thiserror::Error;

/// Failures talking to the event store. Writes are retried by the ingestion
/// buffer, queries degrade to an empty result in the recommendation stages.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to write events: {0}")]
    WriteError(String),
    #[error("failed to query events: {0}")]
    QueryError(String),
    #[error("failed to apply schema: {0}")]
    SchemaError(String),
}
