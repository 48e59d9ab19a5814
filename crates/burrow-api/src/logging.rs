//! Tracing subscriber setup.
//!
//! The store only emits `tracing` events; applications that have no
//! subscriber of their own can install one with [`LogConfig::init`].
//! Events go to stdout, to a daily-rolled file, or to both.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILE_NAME: &str = "burrow.log";

/// Where events are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    /// Daily-rolled file; the date is appended to the file name
    File(PathBuf),
    /// Stdout and a daily-rolled file
    Both(PathBuf),
}

impl LogOutput {
    fn stdout(&self) -> bool {
        matches!(self, LogOutput::Stdout | LogOutput::Both(_))
    }

    fn file(&self) -> Option<&Path> {
        match self {
            LogOutput::Stdout => None,
            LogOutput::File(path) | LogOutput::Both(path) => Some(path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human oriented
    Pretty,
    /// One line per event
    Compact,
}

/// Subscriber settings.
///
/// `filter` takes `EnvFilter` directives (`"info"`, `"burrow_engine=debug"`).
/// `RUST_LOG` wins over it when set.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub filter: String,
    pub output: LogOutput,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::with_filter("info")
    }
}

impl LogConfig {
    /// Stdout, pretty format, the given filter directives
    pub fn with_filter<S: Into<String>>(filter: S) -> Self {
        Self {
            filter: filter.into(),
            output: LogOutput::Stdout,
            format: LogFormat::Pretty,
        }
    }

    pub fn debug() -> Self {
        Self::with_filter("debug")
    }

    pub fn warn() -> Self {
        Self::with_filter("warn")
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Installs the global subscriber.
    ///
    /// With file output the returned guard owns the background writer:
    /// keep it alive for as long as events should reach the file.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the filter does not parse or a global
    /// subscriber is already set.
    ///
    /// ```rust,no_run
    /// use burrow::logging::{LogConfig, LogOutput};
    ///
    /// let _guard = LogConfig::default()
    ///     .output(LogOutput::Both("logs/burrow.log".into()))
    ///     .init()?;
    /// # Ok::<(), burrow::Error>(())
    /// ```
    pub fn init(self) -> Result<Option<WorkerGuard>> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.filter).map_err(|e| {
                Error::Config(format!("invalid log filter {:?}: {e}", self.filter))
            })?,
        };

        let (file_layer, guard) = match self.output.file() {
            Some(path) => {
                let (writer, guard) = tracing_appender::non_blocking(daily_roller(path));
                (Some(layer_for(self.format, writer)), Some(guard))
            }
            None => (None, None),
        };
        let stdout_layer = self
            .output
            .stdout()
            .then(|| layer_for(self.format, std::io::stdout));

        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| Error::Config(format!("global subscriber already set: {e}")))?;

        Ok(guard)
    }
}

fn daily_roller(path: &Path) -> tracing_appender::rolling::RollingFileAppender {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_FILE_NAME);
    tracing_appender::rolling::daily(dir, name)
}

fn layer_for<S, W>(format: LogFormat, writer: W) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer);
    match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}
