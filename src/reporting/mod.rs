//! Error reporting policy.
//!
//! Every failure in the tool is surfaced through [`Reporter`], which turns
//! an error plus a [`Severity`] into one log line on the context's sink.
//!
//! # Rules
//! - No cause, no line: `report(None, ..)` does nothing
//! - An empty message is replaced by [`DEFAULT_ERROR_MESSAGE`]
//! - `Error` and `Fatal` reports carry the cause in an `error` field;
//!   `Warn` reports do not
//! - `Fatal` writes the line and then hands control to the [`Terminator`]
//!   (the process exits with status 1 unless a test terminator is set)

use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use serde_json::Value;

use crate::observability::{Fields, Level, LogSink, Record};

/// Message used when a report does not supply one.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error has occurred";

/// Exit status used for fatal reports.
pub const FATAL_EXIT_CODE: i32 = 1;

/// How loudly a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// Parse a textual tag. Only `warn`, `error` and `fatal` are known.
    pub fn from_tag(tag: &str) -> Option<Severity> {
        match tag {
            "warn" => Some(Severity::Warn),
            "error" => Some(Severity::Error),
            "fatal" => Some(Severity::Fatal),
            _ => None,
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Severity::Warn => Level::Warn,
            Severity::Error => Level::Error,
            Severity::Fatal => Level::Fatal,
        }
    }

    fn injects_cause(&self) -> bool {
        matches!(self, Severity::Error | Severity::Fatal)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(tag)
    }
}

/// A failure ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub cause: String,
    pub severity: Severity,
    pub message: String,
    pub fields: Fields,
}

impl ErrorReport {
    pub fn new(cause: &dyn Error, severity: Severity, message: &str, mut fields: Fields) -> Self {
        let cause = cause.to_string();
        if severity.injects_cause() {
            fields.insert("error".to_string(), Value::String(cause.clone()));
        }
        let message = if message.is_empty() {
            DEFAULT_ERROR_MESSAGE.to_string()
        } else {
            message.to_string()
        };

        Self {
            cause,
            severity,
            message,
            fields,
        }
    }

    pub fn into_record(self) -> Record {
        Record::new(self.severity.level(), self.message).with_fields(self.fields)
    }
}

/// What happens after a fatal line has been written.
pub trait Terminator: Send + Sync {
    fn terminate(&self, code: i32);
}

/// Exits the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl Terminator for ProcessExit {
    fn terminate(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Routes reports to the sink at the matching level.
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<LogSink>,
    terminator: Arc<dyn Terminator>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

impl Reporter {
    pub fn new(sink: Arc<LogSink>, terminator: Arc<dyn Terminator>) -> Self {
        Self { sink, terminator }
    }

    pub fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }

    /// Report a failure without extra fields.
    #[track_caller]
    pub fn report(&self, cause: Option<&dyn Error>, severity: Severity, message: &str) {
        self.route(Location::caller(), cause, severity, message, Fields::new());
    }

    /// Report a failure with contextual fields.
    #[track_caller]
    pub fn report_with_fields(
        &self,
        cause: Option<&dyn Error>,
        severity: Severity,
        message: &str,
        fields: Fields,
    ) {
        self.route(Location::caller(), cause, severity, message, fields);
    }

    /// Report using a textual severity tag.
    ///
    /// Unknown tags are ignored: nothing is written and nothing is
    /// returned. Prefer [`Reporter::report`] with a [`Severity`].
    #[track_caller]
    pub fn report_tagged(&self, cause: Option<&dyn Error>, tag: &str, message: &str, fields: Fields) {
        if let Some(severity) = Severity::from_tag(tag) {
            self.route(Location::caller(), cause, severity, message, fields);
        }
    }

    fn route(
        &self,
        location: &Location<'_>,
        cause: Option<&dyn Error>,
        severity: Severity,
        message: &str,
        fields: Fields,
    ) {
        let Some(cause) = cause else {
            return;
        };
        let mut record = ErrorReport::new(cause, severity, message, fields).into_record();
        if self.sink.reports_caller() {
            record = record.with_location(location);
        }
        self.sink.emit(record);

        if severity == Severity::Fatal {
            self.terminator.terminate(FATAL_EXIT_CODE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogConfig;
    use crate::observability::capture::SharedBuffer;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTerminator(AtomicUsize);

    impl Terminator for CountingTerminator {
        fn terminate(&self, _code: i32) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn reporter(buffer: &SharedBuffer) -> (Reporter, Arc<CountingTerminator>) {
        let config = LogConfig {
            level: "debug".into(),
            format: "json".into(),
            ..LogConfig::default()
        };
        let sink = LogSink::builder(&config)
            .console(buffer.clone())
            .configure()
            .unwrap();
        let terminator = Arc::new(CountingTerminator::default());
        (Reporter::new(Arc::new(sink), terminator.clone()), terminator)
    }

    fn cause() -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, "Makefile not found")
    }

    #[test]
    fn test_no_cause_is_a_no_op() {
        let buffer = SharedBuffer::default();
        let (reporter, terminator) = reporter(&buffer);

        for severity in [Severity::Warn, Severity::Error, Severity::Fatal] {
            reporter.report(None, severity, "nothing happened");
        }
        assert!(buffer.is_empty());
        assert_eq!(terminator.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_warn_has_no_error_field() {
        let buffer = SharedBuffer::default();
        let (reporter, _) = reporter(&buffer);

        reporter.report(Some(&cause()), Severity::Warn, "Cache miss");
        let lines = buffer.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "warning");
        assert!(lines[0].get("error").is_none());
    }

    #[test]
    fn test_error_injects_cause() {
        let buffer = SharedBuffer::default();
        let (reporter, terminator) = reporter(&buffer);

        let fields = Fields::from([("stage".to_string(), Value::from("build"))]);
        reporter.report_with_fields(Some(&cause()), Severity::Error, "Stage failed", fields);
        let lines = buffer.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "error");
        assert_eq!(lines[0]["error"], "Makefile not found");
        assert_eq!(lines[0]["stage"], "build");
        assert_eq!(terminator.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fatal_writes_then_terminates() {
        let buffer = SharedBuffer::default();
        let (reporter, terminator) = reporter(&buffer);

        reporter.report(Some(&cause()), Severity::Fatal, "");
        let lines = buffer.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "fatal");
        assert_eq!(lines[0]["msg"], DEFAULT_ERROR_MESSAGE);
        assert_eq!(lines[0]["error"], "Makefile not found");
        assert_eq!(terminator.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_tag_is_dropped() {
        let buffer = SharedBuffer::default();
        let (reporter, _) = reporter(&buffer);

        reporter.report_tagged(Some(&cause()), "banana", "ignored", Fields::new());
        assert!(buffer.is_empty());

        reporter.report_tagged(Some(&cause()), "error", "kept", Fields::new());
        assert_eq!(buffer.json_lines().len(), 1);
    }

    #[test]
    fn test_report_carries_caller_at_trace() {
        let buffer = SharedBuffer::default();
        let config = LogConfig {
            level: "trace".into(),
            format: "json".into(),
            ..LogConfig::default()
        };
        let sink = LogSink::builder(&config)
            .console(buffer.clone())
            .configure()
            .unwrap();
        let reporter = Reporter::new(Arc::new(sink), Arc::new(CountingTerminator::default()));

        reporter.report(Some(&cause()), Severity::Error, "Stage failed");
        let lines = buffer.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["error"], "Makefile not found");
        let caller = lines[0]["caller"].as_str().unwrap();
        assert!(caller.starts_with("src/reporting/mod.rs:"));
    }

    #[test]
    fn test_report_builds_expected_record() {
        let report = ErrorReport::new(&cause(), Severity::Warn, "", Fields::new());
        assert_eq!(report.message, DEFAULT_ERROR_MESSAGE);
        assert!(report.fields.is_empty());

        let record = report.into_record();
        assert_eq!(record.level, Level::Warn);
    }
}
