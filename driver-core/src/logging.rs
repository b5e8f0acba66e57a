use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    Layer,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Targets whose verbosity follows the configured levels
const DRIVER_TARGETS: [&str; 2] = ["driver_core", "driver_cluster"];

/// Initialize structured logging for the driver
///
/// The configured level applies to the driver's own targets and
/// `cluster_level`, when set, overrides it for the cluster registry. Every
/// other target is capped at `warn`. `RUST_LOG` replaces the whole filter.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let directives = filter_directives(config)?;
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&directives))?;

    let writer = match &config.file_path {
        Some(file_path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;
            BoxMakeWriter::new(std::sync::Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = if config.format.as_str() == "json" {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_line_number(true)
            .with_writer(writer)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_line_number(true)
            .with_file(false)
            .with_writer(writer)
            .boxed()
    };
    registry.with(layer).try_init()?;

    Ok(())
}

/// Filter directives for `config`, e.g. `warn,driver_core=info,driver_cluster=debug`
fn filter_directives(config: &LoggingConfig) -> anyhow::Result<String> {
    let level = parse_log_level(&config.level)?;
    let cluster_level = match &config.cluster_level {
        Some(cluster_level) => parse_log_level(cluster_level)?,
        None => level,
    };

    let mut directives = vec![Level::WARN.min(level).to_string().to_lowercase()];
    for target in DRIVER_TARGETS {
        let target_level = if target == "driver_cluster" { cluster_level } else { level };
        directives.push(format!("{target}={}", target_level.to_string().to_lowercase()));
    }
    Ok(directives.join(","))
}

/// Parse log level string to tracing Level
fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}
