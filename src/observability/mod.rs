//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Collaborators produce:
//!     → LogSink::log / Reporter::report (direct records)
//!     → tracing::info! etc. under the sink's dispatch → layer.rs
//!
//! Both paths:
//!     → record.rs (level, message, fields, caller)
//!     → format.rs (JSON or text line)
//!     → sink.rs (threshold, mutex-guarded writer: console or file)
//! ```
//!
//! # Design Decisions
//! - One sink per context; nothing is installed as a global default
//! - Structured logging (JSON) for machine parsing, text for terminals
//! - Pool metrics go through the `metrics` facade (see metrics.rs)

pub mod capture;
pub mod format;
pub mod layer;
pub mod level;
pub mod metrics;
pub mod record;
pub mod sink;

pub use format::{Encoding, LOGGING_TIMESTAMP};
pub use level::{Level, ParseLevelError};
pub use record::{Fields, Record};
pub use sink::{LogSink, LoggingError, SinkBuilder, Target};
