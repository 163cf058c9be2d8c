//! mrbuild application context.
//!
//! The long-lived context a build run is executed in: a configured log
//! sink, a severity-aware error reporter in front of it, and a bounded
//! worker pool whose tasks log through the same sink.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use mrbuild::{AppConfig, AppContext, Severity};
//!
//! let ctx = AppContext::bootstrap(&AppConfig::default())?;
//! ctx.submit(|| tracing::info!("compiling"))?;
//!
//! let err = std::io::Error::other("cache unavailable");
//! ctx.report(Some(&err), Severity::Warn, "Falling back to a clean build");
//!
//! ctx.shutdown().await;
//! # Ok(())
//! # }
//! ```

// Core subsystems
pub mod config;
pub mod observability;
pub mod reporting;
pub mod workers;

// Cross-cutting concerns
pub mod lifecycle;

pub use config::{AppConfig, LogConfig};
pub use lifecycle::{AppContext, ContextBuilder, LoggedContext};
pub use observability::{Fields, Level, LogSink};
pub use reporting::{Reporter, Severity, Terminator};
pub use workers::{PoolError, WorkerPool};
