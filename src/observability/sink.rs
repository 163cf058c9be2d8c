//! The configured log destination.
//!
//! # Responsibilities
//! - Resolve a [`LogConfig`] into level, encoding and destination
//! - Serialize concurrent writers so lines never interleave
//! - Annotate lines with the call site when running at trace level
//!
//! # Design Decisions
//! - Immutable once configured; reconfiguring means building a new sink
//! - A file that cannot be opened degrades to the console with a warning
//! - An unparseable level degrades to debug and is returned as an error
//!   carrying the fallback sink, so the caller decides how loud to be

use std::fmt;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};
use std::panic::Location;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

use crate::config::LogConfig;
use crate::observability::format::Encoding;
use crate::observability::layer::SinkLayer;
use crate::observability::level::{Level, ParseLevelError};
use crate::observability::record::{Fields, Record};

/// Level used when the configured one cannot be parsed.
pub const FALLBACK_LEVEL: Level = Level::Debug;

/// Where encoded lines end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Console,
    File(PathBuf),
}

/// Error returned by [`LogSink::configure`].
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The level string was rejected. The sink was still built, at
    /// [`FALLBACK_LEVEL`], and travels with the error.
    #[error("unable to set logging level")]
    InvalidLevel {
        #[source]
        source: ParseLevelError,
        fallback: Box<LogSink>,
    },
}

impl LoggingError {
    /// Take the degraded sink out of the error.
    pub fn into_fallback(self) -> LogSink {
        match self {
            LoggingError::InvalidLevel { fallback, .. } => *fallback,
        }
    }
}

/// Builder that lets the console stream be swapped out.
pub struct SinkBuilder<'a> {
    config: &'a LogConfig,
    console: Box<dyn Write + Send>,
    console_is_terminal: bool,
}

impl<'a> SinkBuilder<'a> {
    /// Replace stdout with another console writer. Colour is then only
    /// used when forced by the config.
    pub fn console(mut self, writer: impl Write + Send + 'static) -> Self {
        self.console = Box::new(writer);
        self.console_is_terminal = false;
        self
    }

    pub fn configure(self) -> Result<LogSink, LoggingError> {
        let config = self.config;

        let (level, level_error) = match config.level.parse::<Level>() {
            Ok(level) => (level, None),
            Err(e) => (FALLBACK_LEVEL, Some(e)),
        };

        let mut writer = self.console;
        let mut target = Target::Console;
        let mut redirect_error = None;
        if let Some(path) = config.file.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => {
                    writer = Box::new(file);
                    target = Target::File(path.clone());
                }
                Err(e) => redirect_error = Some(e),
            }
        }

        // terminal detection only applies while still writing to the console
        let on_terminal = target == Target::Console && self.console_is_terminal;
        let encoding = if config.format == "json" {
            Encoding::Json
        } else {
            Encoding::Text {
                colour: config.colour || on_terminal,
            }
        };

        let sink = LogSink {
            level,
            encoding,
            report_caller: level == Level::Trace,
            target,
            writer: Mutex::new(writer),
        };
        if let Some(e) = redirect_error {
            sink.warn(format!("Failed to log to file, defaulting to screen: {}", e));
        }

        match level_error {
            None => Ok(sink),
            Some(source) => Err(LoggingError::InvalidLevel {
                source,
                fallback: Box::new(sink),
            }),
        }
    }
}

/// A configured destination, encoding and minimum level.
pub struct LogSink {
    level: Level,
    encoding: Encoding,
    report_caller: bool,
    target: Target,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("level", &self.level)
            .field("encoding", &self.encoding)
            .field("report_caller", &self.report_caller)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl LogSink {
    /// Configure a sink that writes to stdout unless a file is set.
    pub fn configure(config: &LogConfig) -> Result<LogSink, LoggingError> {
        Self::builder(config).configure()
    }

    pub fn builder(config: &LogConfig) -> SinkBuilder<'_> {
        SinkBuilder {
            config,
            console: Box::new(std::io::stdout()),
            console_is_terminal: std::io::stdout().is_terminal(),
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn reports_caller(&self) -> bool {
        self.report_caller
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    /// Write a record if it passes the level threshold.
    pub fn emit(&self, record: Record) {
        if !self.enabled(record.level) {
            return;
        }
        let line = self.encoding.encode(&record);

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let written = writer.write_all(line.as_bytes());
        if let Err(e) = written.and_then(|_| writer.flush()) {
            eprintln!("Failed to write to log: {}", e);
        }
    }

    /// Build a record at the call site and emit it.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>, fields: Fields) {
        if !self.enabled(level) {
            return;
        }
        let mut record = Record::new(level, message).with_fields(fields);
        if self.report_caller {
            record = record.with_location(Location::caller());
        }
        self.emit(record);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message, Fields::new());
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message, Fields::new());
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(Level::Warn, message, Fields::new());
    }

    /// A `tracing` dispatcher that routes events into this sink.
    ///
    /// Install it with `tracing::dispatcher::with_default` (or
    /// `WithSubscriber` for futures) so plain `tracing::info!` calls made
    /// by tasks land in the same destination.
    pub fn dispatch(self: &Arc<Self>) -> tracing::Dispatch {
        let filter = tracing_subscriber::filter::LevelFilter::from(self.level);
        let subscriber = tracing_subscriber::registry()
            .with(SinkLayer::new(Arc::clone(self)).with_filter(filter));
        tracing::Dispatch::new(subscriber)
    }
}
