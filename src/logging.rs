//! Structured logging.
//!
//! Building a [`Logger`] never touches process-wide state. The handle wraps a
//! `tracing::Dispatch`; the binary installs it as the global default, tests
//! scope it with `tracing::dispatcher::with_default`.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::Dispatch;
use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    EnvFilter, Layer, Registry,
};

pub const LOG_FILE_NAME: &str = "service.log";

/// Extra layer stacked under the filter, e.g. the OpenTelemetry bridge
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Case-insensitive; anything unrecognised is `Info`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => LogLevel::Debug,
            "WARN" | "WARNING" => LogLevel::Warn,
            "ERROR" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Human readable output instead of JSON lines
    pub pretty: bool,
    pub log_to_file: bool,
    /// Directory receiving `service.log`
    pub file_path: String,
    /// Explicit filter directives, overriding `level`
    pub directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            pretty: false,
            log_to_file: false,
            file_path: "./logs".to_string(),
            directives: None,
        }
    }
}

impl LogConfig {
    fn filter(&self) -> Result<EnvFilter> {
        match &self.directives {
            Some(directives) => EnvFilter::try_new(directives)
                .with_context(|| format!("Invalid log directives: {}", directives)),
            None => Ok(EnvFilter::new(format!(
                "{},h2=warn,hyper=warn,tower=info,sqlx::query=warn",
                self.level.as_str()
            ))),
        }
    }
}

#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    /// Build a logger writing to stdout, or to `<file_path>/service.log` when
    /// file logging is enabled
    pub fn build(config: &LogConfig, extra_layers: Vec<BoxedLayer>) -> Result<Self> {
        let writer = if config.log_to_file {
            let dir = Path::new(&config.file_path);
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let path = dir.join(LOG_FILE_NAME);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        } else {
            BoxMakeWriter::new(std::io::stdout)
        };

        Self::with_writer(config, writer, extra_layers)
    }

    pub fn with_writer(
        config: &LogConfig,
        writer: BoxMakeWriter,
        extra_layers: Vec<BoxedLayer>,
    ) -> Result<Self> {
        let filter = config.filter()?;

        let fmt_layer: BoxedLayer = if config.pretty {
            fmt::layer()
                .pretty()
                .with_ansi(!config.log_to_file)
                .with_writer(writer)
                .boxed()
        } else {
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(writer)
                .boxed()
        };

        let mut layers = extra_layers;
        layers.push(fmt_layer);

        let subscriber = tracing_subscriber::registry().with(layers).with(filter);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
        })
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Make this logger the process-wide default. Fails if one is already set.
    pub fn install(self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch)
            .context("A global logger is already installed")
    }
}
