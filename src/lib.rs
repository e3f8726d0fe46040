pub mod config;
pub mod engine;
pub mod sim;
pub mod telemetry;
