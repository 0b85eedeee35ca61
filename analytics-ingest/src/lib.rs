pub mod api;
pub mod buffer;
pub mod config;
pub mod router;
pub mod server;
pub mod track;
