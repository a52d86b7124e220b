//! Structured logging for the release webhook receiver
//!
//! Supports JSON, pretty and compact output. The level comes from
//! `RUST_LOG` when set, otherwise from the CLI or the config file.
//!
//! Deployment log lines are emitted inside [`deployment_span`] so every
//! line the worker writes carries the release version:
//! ```rust,ignore
//! let _span = releasehook::logging::deployment_span("v1.2.3").entered();
//! ```
//!
//! When a log file is configured the same events are also appended to it,
//! without ANSI colours.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info_span, Span};
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::SystemConfig;
use crate::types::{Error, Result};

/// Span wrapping the processing of one deployment
pub fn deployment_span(version: &str) -> Span {
    info_span!("deployment", version = version)
}

/// Span wrapping the handling of one webhook delivery
pub fn delivery_span(event: &str, delivery: Option<&str>) -> Span {
    info_span!(
        "webhook",
        event = event,
        delivery = delivery.unwrap_or("-")
    )
}

/// Log level enum values as strings for configuration
pub mod level {
    pub const TRACE: &str = "trace";
    pub const DEBUG: &str = "debug";
    pub const INFO: &str = "info";
    pub const WARN: &str = "warn";
    pub const ERROR: &str = "error";
}

/// Log format enum values as strings for configuration
pub mod format {
    pub const JSON: &str = "json";
    pub const PRETTY: &str = "pretty";
    pub const COMPACT: &str = "compact";
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global tracing subscriber.
///
/// Precedence: CLI overrides, then the config file, then defaults.
/// Calling this twice returns an error rather than panicking.
pub fn init(
    log_level_override: Option<&str>,
    log_format_override: Option<&str>,
    log_file_override: Option<&Path>,
    system_config: Option<&SystemConfig>,
) -> Result<()> {
    let log_level = log_level_override
        .or_else(|| system_config.map(|c| c.logging.level.as_str()))
        .unwrap_or(level::INFO);

    let log_format = log_format_override
        .or_else(|| system_config.map(|c| c.logging.format.as_str()))
        .unwrap_or(format::PRETTY);

    let log_file = log_file_override.map(Path::to_path_buf).or_else(|| {
        system_config
            .and_then(|c| c.logging.file.as_deref())
            .map(PathBuf::from)
    });
    let file = log_file.as_deref().map(open_log_file).transpose()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(build_layers(log_format, file))
        .with(env_filter)
        .try_init()
        .map_err(|e| Error::Application(format!("Failed to initialize logging: {}", e)))
}

fn timer() -> ChronoLocal {
    ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string())
}

/// Stdout layer in the requested format, plus a plain-text file layer
fn build_layers(log_format: &str, file: Option<File>) -> Vec<BoxedLayer> {
    let stdout: BoxedLayer = match log_format {
        format::JSON => fmt::layer()
            .json()
            .with_timer(timer())
            .with_target(false)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        format::PRETTY => fmt::layer()
            .pretty()
            .with_timer(timer())
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        _ => fmt::layer()
            .compact()
            .with_timer(timer())
            .with_target(false)
            .boxed(),
    };

    let mut layers = vec![stdout];
    if let Some(file) = file {
        layers.push(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_timer(timer())
                .with_target(false)
                .boxed(),
        );
    }
    layers
}

/// Open `path` for appending, creating it if needed
fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            Error::Application(format!(
                "Failed to open log file '{}': {}",
                path.display(),
                e
            ))
        })
}
