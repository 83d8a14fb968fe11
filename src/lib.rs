pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod gps;
pub mod hw;
pub mod ingest;
pub mod model;
pub mod modem;
pub mod sender;
pub mod util;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
