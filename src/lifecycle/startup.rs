//! Startup orchestration.
//!
//! # Responsibilities
//! - Configure the log sink from the log configuration
//! - Apply the invalid-level policy
//! - Start the worker pool once logging exists
//!
//! # Invalid level policy
//! An unparseable level both degrades and escalates: the sink is built at
//! debug, then the parse error is reported at fatal with the message
//! "Unable to set logging level". With the default terminator the process
//! exits right after that line. A test terminator lets startup continue
//! with the debug-level sink.

use std::io::Write;
use std::sync::Arc;

use crate::config::LogConfig;
use crate::lifecycle::context::AppContext;
use crate::observability::{LogSink, LoggingError};
use crate::reporting::{ProcessExit, Reporter, Severity, Terminator};
use crate::workers::{PoolError, WorkerPool};

pub const INVALID_LEVEL_MESSAGE: &str = "Unable to set logging level";

/// First stage: nothing configured yet.
pub struct ContextBuilder {
    terminator: Arc<dyn Terminator>,
    console: Option<Box<dyn Write + Send>>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            terminator: Arc::new(ProcessExit),
            console: None,
        }
    }

    /// Replace what happens after a fatal report.
    pub fn terminator(mut self, terminator: Arc<dyn Terminator>) -> Self {
        self.terminator = terminator;
        self
    }

    /// Write console output somewhere other than stdout.
    pub fn console(mut self, writer: impl Write + Send + 'static) -> Self {
        self.console = Some(Box::new(writer));
        self
    }

    pub fn configure_logging(self, config: &LogConfig) -> LoggedContext {
        let mut builder = LogSink::builder(config);
        if let Some(console) = self.console {
            builder = builder.console(console);
        }

        let reporter = match builder.configure() {
            Ok(sink) => Reporter::new(Arc::new(sink), self.terminator),
            Err(LoggingError::InvalidLevel { source, fallback }) => {
                let reporter = Reporter::new(Arc::new(*fallback), self.terminator);
                reporter.report(Some(&source), Severity::Fatal, INVALID_LEVEL_MESSAGE);
                reporter
            }
        };

        LoggedContext { reporter }
    }
}

/// Second stage: logging is configured, workers are not.
#[derive(Debug)]
pub struct LoggedContext {
    reporter: Reporter,
}

impl LoggedContext {
    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Start the worker pool and finish the context.
    pub fn configure_workers(self, count: usize) -> Result<AppContext, PoolError> {
        let workers = WorkerPool::new(count, self.reporter.clone())?;
        Ok(AppContext::new(self.reporter, workers))
    }
}
