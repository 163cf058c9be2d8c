//! Worker pool subsystem.
//!
//! # Data Flow
//! ```text
//! Collaborator
//!     → WorkerPool::submit / submit_async (never blocks)
//!     → unbounded queue
//!     → one of `capacity` executors
//!     → spawn_blocking / spawn under the sink's tracing dispatch
//!     → panics reported at error through the Reporter
//! ```
//!
//! # Design Decisions
//! - Capacity is fixed at construction; zero is rejected
//! - Submitted tasks are never dropped while the pool is open
//! - `stop_wait` drains the queue, `stop` discards it

pub mod pool;
mod task;

pub use pool::{PoolError, WorkerPool};
