pub mod api;
pub mod cache;
pub mod candidate;
pub mod config;
pub mod content;
pub mod endpoint;
pub mod personalize;
pub mod recommender;
pub mod router;
pub mod server;
pub mod similar;
pub mod time;
pub mod trending;

// Compiled into the library so integration tests can build a recommender
// without a content service or a real clock.
pub mod test_utils;
