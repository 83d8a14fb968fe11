pub mod handlers;
pub mod http;
