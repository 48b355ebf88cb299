use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::ValueEnum;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Console output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per event, for CI log processing
    #[default]
    Json,
    /// Human-readable lines
    Pretty,
}

/// Logging configuration shared by both binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    pub debug: bool,
    pub format: LogFormat,
    /// Directory for daily-rotated log files; console only when `None`
    pub log_dir: Option<Utf8PathBuf>,
    pub log_prefix: String,
}

impl LogOptions {
    pub fn new(log_prefix: impl Into<String>) -> Self {
        Self {
            debug: false,
            format: LogFormat::default(),
            log_dir: None,
            log_prefix: log_prefix.into(),
        }
    }
}

/// `RUST_LOG` if set and valid, else `debug` or `info`.
pub fn env_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug_mode {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    })
}

/// Install the global subscriber.
///
/// Console events go to stderr, leaving stdout free. When a log directory is
/// configured it is created if needed and a daily-rotating file layer is added.
///
/// # Returns
/// The file writer's guard, which must be held until exit to flush buffered
/// events, or `None` when logging only to the console
pub fn setup_logging(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &options.log_dir {
        Some(log_dir) => {
            if !log_dir.exists() {
                fs::create_dir_all(log_dir)
                    .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
            }

            let file_appender = rolling::daily(log_dir, &options.log_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let json_layer = (options.format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(false)
            .with_span_list(false)
    });

    let pretty_layer = (options.format == LogFormat::Pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter(options.debug))
        .with(json_layer)
        .with(pretty_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(
        log_dir = ?options.log_dir,
        log_prefix = %options.log_prefix,
        debug = options.debug,
        format = ?options.format,
        "Logging initialized"
    );

    Ok(guard)
}
