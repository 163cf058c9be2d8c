//! The application context.
//!
//! One `AppContext` lives for the whole run. It owns the log sink (through
//! its reporter) and the worker pool, and is handed by reference to every
//! collaborator that needs to log, report a failure, or run work.

use std::error::Error;
use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::AppConfig;
use crate::lifecycle::startup::ContextBuilder;
use crate::observability::{Fields, LogSink};
use crate::reporting::{Reporter, Severity};
use crate::workers::{PoolError, WorkerPool};

#[derive(Debug)]
pub struct AppContext {
    reporter: Reporter,
    workers: WorkerPool,
}

impl AppContext {
    pub(crate) fn new(reporter: Reporter, workers: WorkerPool) -> Self {
        Self { reporter, workers }
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// Configure logging, then workers, from a loaded configuration.
    pub fn bootstrap(config: &AppConfig) -> Result<AppContext, PoolError> {
        Self::builder()
            .configure_logging(&config.log)
            .configure_workers(config.workers)
    }

    pub fn sink(&self) -> &Arc<LogSink> {
        self.reporter.sink()
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    #[track_caller]
    pub fn report(&self, cause: Option<&dyn Error>, severity: Severity, message: &str) {
        self.reporter.report(cause, severity, message);
    }

    #[track_caller]
    pub fn report_with_fields(
        &self,
        cause: Option<&dyn Error>,
        severity: Severity,
        message: &str,
        fields: Fields,
    ) {
        self.reporter
            .report_with_fields(cause, severity, message, fields);
    }

    pub fn submit<F>(&self, f: F) -> Result<Uuid, PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.workers.submit(f)
    }

    pub fn submit_async<Fut>(&self, fut: Fut) -> Result<Uuid, PoolError>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.workers.submit_async(fut)
    }

    /// Stop accepting work and wait for queued and running tasks.
    pub async fn shutdown(&self) {
        self.workers.stop_wait().await;
    }

    /// Stop accepting work, finish running tasks, drop queued ones.
    pub async fn abort(&self) {
        self.workers.stop().await;
    }
}
