pub mod aggregates;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod schema;
pub mod store;

// Compiled into the library so the service crates can reuse the in-memory
// store from their own integration tests.
pub mod test_utils;

pub use crate::client::ClickHouseStore;
pub use crate::config::ClickHouseConfig;
pub use crate::error::StoreError;
pub use crate::event::{Event, EventRow};
pub use crate::store::{EntityViews, EventReader, EventWriter};
