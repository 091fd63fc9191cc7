//! Logging setup for Brass applications.
//!
//! Installs a `tracing-subscriber` registry with one `fmt` layer and an
//! [`EnvFilter`]. The engine opens a `dispatch` span per request, so
//! [`SpanEventConfig::LIFECYCLE`] logs one line when a request starts and
//! one (with its duration) when it ends.
//!
//! ```rust,ignore
//! use brass_runtime::config::{SpanEventConfig, load_config};
//! use brass_runtime::logging::{self, LoggingBuilder};
//!
//! // From configuration
//! logging::init_from_config(&load_config()?.logging);
//!
//! // Or by hand
//! LoggingBuilder::new()
//!     .directive("brass_framework=debug")
//!     .span_events(SpanEventConfig::LIFECYCLE)
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initializes logging from a [`LoggingConfig`].
///
/// Does nothing when a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// A builder for the global tracing subscriber.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: Level,
    directives: Vec<String>,
    span_events: SpanEventConfig,
    format: LogFormat,
    output: LogOutput,
    rotation: LogRotation,
    file_path: Option<PathBuf>,
    target: bool,
    thread_ids: bool,
    file_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Compact lines on stdout at `info`.
    pub fn new() -> Self {
        Self {
            level: Level::INFO,
            directives: Vec::new(),
            span_events: SpanEventConfig::NONE,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            rotation: LogRotation::Never,
            file_path: None,
            target: true,
            thread_ids: false,
            file_location: false,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        // Sorted so the filter does not depend on map iteration order.
        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));

        Self {
            level: config.level.to_tracing_level(),
            directives: filters
                .into_iter()
                .map(|(module, level)| format!("{module}={level}"))
                .collect(),
            span_events: config.span_events,
            format: config.format,
            output: config.output,
            rotation: config.rotation,
            file_path: config.file_path.clone(),
            target: true,
            thread_ids: config.thread_ids,
            file_location: config.file_location,
        }
    }

    /// Sets the level used when `RUST_LOG` is unset.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `brass_core=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEventConfig) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Only used with [`LogOutput::File`].
    pub fn rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    /// Includes file names and line numbers.
    pub fn with_file_location(mut self, enabled: bool) -> Self {
        self.file_location = enabled;
        self
    }

    /// `RUST_LOG` replaces the base level; directives always apply.
    fn filter(&self) -> EnvFilter {
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_lowercase()));
        self.directives
            .iter()
            .filter_map(|directive| directive.parse().ok())
            .fold(base, EnvFilter::add_directive)
    }

    /// The writer for the configured output. File output without a path
    /// goes to stdout.
    fn writer(&self) -> BoxMakeWriter {
        match (self.output, self.file_path.as_deref()) {
            (LogOutput::Stdout, _) | (LogOutput::File, None) => BoxMakeWriter::new(std::io::stdout),
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                let file = path.file_name().unwrap_or_else(|| OsStr::new("brass.log"));
                BoxMakeWriter::new(match self.rotation {
                    LogRotation::Never => tracing_appender::rolling::never(dir, file),
                    LogRotation::Hourly => tracing_appender::rolling::hourly(dir, file),
                    LogRotation::Daily => tracing_appender::rolling::daily(dir, file),
                })
            }
        }
    }

    fn layer(&self) -> BoxedLayer {
        let layer = fmt::layer()
            .with_writer(self.writer())
            .with_span_events(fmt_span(self.span_events))
            .with_target(self.target)
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location);

        match self.format {
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            _ => layer.compact().boxed(),
        }
    }

    /// Installs the subscriber, ignoring failure.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber; fails when one is already set.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let result = tracing_subscriber::registry()
            .with(self.layer())
            .with(self.filter())
            .try_init();

        if result.is_ok() {
            if self.output == LogOutput::File && self.file_path.is_none() {
                tracing::warn!("File output requested without a file path, logging to stdout");
            }
            if cfg!(not(feature = "json-log")) && self.format == LogFormat::Json {
                tracing::warn!("JSON log format requires the `json-log` feature, using compact");
            }
        }
        result
    }
}

fn fmt_span(events: SpanEventConfig) -> FmtSpan {
    [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_fmt_span_presets() {
        assert_eq!(fmt_span(SpanEventConfig::NONE), FmtSpan::NONE);
        assert_eq!(fmt_span(SpanEventConfig::LIFECYCLE), FmtSpan::NEW | FmtSpan::CLOSE);
        assert_eq!(fmt_span(SpanEventConfig::FULL), FmtSpan::FULL);
    }

    #[test]
    fn test_from_config_collects_filters_in_order() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            filters: HashMap::from([
                ("brass_framework".to_string(), LogLevel::Trace),
                ("brass_core".to_string(), LogLevel::Debug),
            ]),
            file_location: true,
            ..Default::default()
        };

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, Level::WARN);
        assert_eq!(builder.directives, ["brass_core=debug", "brass_framework=trace"]);
        assert!(builder.file_location);
    }
}
