use std::sync::Arc;

use thiserror::Error;

/// Error raised by user code inside a task, shared so that outcomes can be
/// cloned between the run callback and batch results.
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct Failure(pub(crate) Arc<anyhow::Error>);

impl Failure {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(err.into()))
    }

    /// The underlying error.
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl From<anyhow::Error> for Failure {
    fn from(e: anyhow::Error) -> Self {
        Failure(Arc::new(e))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FutureError {
    #[error("future has already been resolved")]
    AlreadyResolved,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CancelError {
    #[error("cannot cancel a task twice")]
    AlreadyCanceled,
}

/// Errors delivered to the completion callback of [`Task::run`](crate::Task::run).
#[derive(Debug, Error, Clone)]
pub enum TaskError {
    #[error("cannot run a task twice")]
    AlreadyRan,

    #[error("cannot run a canceled task")]
    Canceled,

    #[error("task failed: {0}")]
    Failed(#[from] Failure),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("completion handle dropped without signaling")]
    Abandoned,
}

impl From<anyhow::Error> for TaskError {
    fn from(e: anyhow::Error) -> Self {
        TaskError::Failed(Failure::from(e))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LazyError {
    #[error("capability set has no member '{0}'")]
    UnknownMember(String),

    #[error("member '{0}' is not callable")]
    NotCallable(String),
}

#[derive(Debug, Error)]
pub enum DawdleError {
    #[error(transparent)]
    Future(#[from] FutureError),

    #[error(transparent)]
    Cancel(#[from] CancelError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Lazy(#[from] LazyError),
}
