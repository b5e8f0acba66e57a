//! Shared configuration and logging bootstrap for the driver crates

pub mod config;
pub mod logging;

pub use config::{ClusterConfig, Config, ConnConfig, LoggingConfig};
pub use logging::init_logging;
