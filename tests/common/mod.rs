//! Shared helpers for integration tests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use mrbuild::observability::capture::SharedBuffer;
use mrbuild::{AppContext, LogConfig, LoggedContext, Terminator};

/// Records exit codes instead of exiting.
#[derive(Debug, Default)]
pub struct RecordingTerminator {
    codes: Mutex<Vec<i32>>,
}

impl RecordingTerminator {
    pub fn codes(&self) -> Vec<i32> {
        self.codes.lock().unwrap().clone()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, code: i32) {
        self.codes.lock().unwrap().push(code);
    }
}

pub fn log_config(level: &str, format: &str) -> LogConfig {
    LogConfig {
        level: level.to_string(),
        format: format.to_string(),
        colour: false,
        file: None,
    }
}

/// Configure logging against an in-memory console.
#[allow(dead_code)]
pub fn logged(config: &LogConfig) -> (LoggedContext, SharedBuffer, Arc<RecordingTerminator>) {
    let console = SharedBuffer::default();
    let terminator = Arc::new(RecordingTerminator::default());
    let logged = AppContext::builder()
        .console(console.clone())
        .terminator(terminator.clone())
        .configure_logging(config);
    (logged, console, terminator)
}

/// A full context with `workers` executors and an in-memory console.
#[allow(dead_code)]
pub fn context(level: &str, workers: usize) -> (AppContext, SharedBuffer) {
    let (logged, console, _) = logged(&log_config(level, "json"));
    let ctx = logged.configure_workers(workers).unwrap();
    (ctx, console)
}

/// A path in the temp dir that does not exist yet.
#[allow(dead_code)]
pub fn temp_log_path() -> PathBuf {
    std::env::temp_dir().join(format!("mrbuild-test-{}.log", uuid::Uuid::new_v4()))
}
