pub mod store;
pub mod telemetry;
