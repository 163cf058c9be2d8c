//! Units of work accepted by the pool.

use futures_util::future::BoxFuture;
use uuid::Uuid;

pub(crate) type BlockingJob = Box<dyn FnOnce() + Send + 'static>;

/// The body of a task.
pub(crate) enum Job {
    /// Synchronous work, run on tokio's blocking thread pool.
    Blocking(BlockingJob),
    /// A future, run on the async runtime.
    Async(BoxFuture<'static, ()>),
}

/// A queued job with its identity.
pub(crate) struct Task {
    pub id: Uuid,
    pub job: Job,
}

impl Task {
    pub fn blocking<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            job: Job::Blocking(Box::new(f)),
        }
    }

    pub fn future(fut: BoxFuture<'static, ()>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job: Job::Async(fut),
        }
    }
}
