//! Worker pool metrics.
//!
//! # Metrics
//! - `mrbuild_pool_tasks_submitted_total` (counter): tasks accepted
//! - `mrbuild_pool_tasks_completed_total` (counter): tasks finished, by outcome
//! - `mrbuild_pool_waiting_tasks` (gauge): tasks queued but not started
//! - `mrbuild_pool_running_tasks` (gauge): tasks currently executing
//!
//! No recorder is installed by this crate; without one the calls are no-ops.

pub fn record_task_submitted() {
    metrics::counter!("mrbuild_pool_tasks_submitted_total").increment(1);
}

pub fn record_task_completed(outcome: &'static str) {
    metrics::counter!("mrbuild_pool_tasks_completed_total", "outcome" => outcome).increment(1);
}

pub fn set_waiting_tasks(count: usize) {
    metrics::gauge!("mrbuild_pool_waiting_tasks").set(count as f64);
}

pub fn set_running_tasks(count: usize) {
    metrics::gauge!("mrbuild_pool_running_tasks").set(count as f64);
}
