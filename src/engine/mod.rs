//! The deferred task machinery.
//!
//! A [`Task`] binds a [`Func`] to a list of [`Arg`]s. When the task is
//! created, its arguments are scanned for futures. Running the task only
//! marks it as wanted: the function is invoked once every future has been
//! resolved and substituted into the argument tree.
//!
//! ## States
//!
//! ```text
//! Procrastinating ──run + deps ready──▶ Running ──finished──▶ Done
//!        │
//!        └──────────cancel──────────▶ Canceled
//! ```

mod completion;
mod scan;
mod task;

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::core::{Arg, Notes};

pub use crate::engine::completion::Completion;
pub use crate::engine::task::{Task, TaskBuilder};

pub type SyncFn = dyn Fn(Vec<Arg>) -> anyhow::Result<Arg> + Send + Sync;
pub type CallbackFn = dyn Fn(Vec<Arg>, Completion) -> anyhow::Result<Arg> + Send + Sync;

/// Hook receiving the values a callback-style function signals through its
/// [`Completion`].
pub type SignalHook = Box<dyn FnOnce(Vec<Arg>) -> anyhow::Result<()> + Send>;

/// How a function reports that it has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Finished when it returns.
    Sync,
    /// Finished when it has returned and signaled its [`Completion`].
    Callback,
}

/// The function a task defers.
#[derive(Clone)]
pub enum Func {
    Sync(Arc<SyncFn>),
    Callback(Arc<CallbackFn>),
}

impl Func {
    /// A function that is done as soon as it returns.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Vec<Arg>) -> anyhow::Result<Arg> + Send + Sync + 'static,
    {
        Func::Sync(Arc::new(f))
    }

    /// A function that receives a [`Completion`] and signals it, possibly
    /// long after returning.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Vec<Arg>, Completion) -> anyhow::Result<Arg> + Send + Sync + 'static,
    {
        Func::Callback(Arc::new(f))
    }

    pub fn mode(&self) -> Mode {
        match self {
            Func::Sync(_) => Mode::Sync,
            Func::Callback(_) => Mode::Callback,
        }
    }
}

impl std::fmt::Debug for Func {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Func::{:?}(*)", self.mode())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Procrastinating,
    Running,
    Canceled,
    Done,
}

impl Status {
    /// Stable name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Procrastinating => "procrastinating",
            Status::Running => "running",
            Status::Canceled => "canceled",
            Status::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Canceled | Status::Done)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source of task identifiers. Clones draw from the same sequence, so
/// identifiers handed out through any clone are unique and increasing.
#[derive(Debug, Clone)]
pub struct TaskIds {
    next: Arc<AtomicU64>,
}

impl TaskIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(first)),
        }
    }

    /// Draws the next identifier.
    ///
    /// # Panics
    ///
    /// Panics once the sequence reaches `u64::MAX`, rather than wrapping
    /// around and handing out a smaller identifier.
    pub fn next_id(&self) -> TaskId {
        match self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
        {
            Ok(id) => TaskId(id),
            Err(_) => panic!("task identifiers exhausted"),
        }
    }
}

impl Default for TaskIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a task returned by [`Task::info`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub status: Status,
    pub notes: Notes,
}
