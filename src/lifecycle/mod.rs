//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     ContextBuilder → configure_logging → LoggedContext
//!                    → configure_workers → AppContext
//!
//! Runtime (context.rs):
//!     AppContext shared by reference with every collaborator
//!     → report / submit / sink
//!
//! Shutdown:
//!     shutdown() drains the pool; abort() discards queued work
//!     signals.rs resolves on SIGINT/SIGTERM
//! ```
//!
//! # Design Decisions
//! - Ordered startup is enforced by types: workers can only be configured
//!   on a context that already has a sink
//! - No global state; the context is passed explicitly

pub mod context;
pub mod signals;
pub mod startup;

pub use context::AppContext;
pub use startup::{ContextBuilder, LoggedContext};
