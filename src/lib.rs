#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod core;
mod engine;
mod error;
mod future;
mod lazy;
mod list;
#[cfg(feature = "logging")]
pub mod logging;
mod utils;

pub use crate::core::{Arg, Dynamic, Notes};
pub use crate::engine::{
    CallbackFn, Completion, Func, Mode, SignalHook, Status, SyncFn, Task, TaskBuilder, TaskId,
    TaskIds, TaskInfo,
};
pub use crate::error::*;
pub use crate::future::Future;
pub use crate::lazy::{Capabilities, Lazify, LazyCapabilities, LazyFn, LazyMember, Member};
pub use crate::list::{Settled, TaskList, TaskListOptions};

/// Entry point for creating futures, tasks and task lists.
///
/// The engine owns the identifier sequence. Every task created through it,
/// through its task lists, or through its lazy wrappers draws from that
/// sequence, so identifiers are unique and increase in creation order.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    ids: TaskIds,
}

impl Engine {
    /// Engine whose first task gets id 1.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn ids(&self) -> &TaskIds {
        &self.ids
    }

    /// A new pending future.
    pub fn future<T>(&self) -> Future<T>
    where
        T: Clone + Send + 'static,
    {
        Future::new()
    }

    /// Starts building a task around `func`.
    pub fn task(&self, func: Func) -> TaskBuilder {
        TaskBuilder::new(self.ids.clone(), func)
    }

    /// Creates a task bound to `func` and `args`.
    pub fn create_task<I>(&self, func: Func, args: I) -> Task
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.task(func).args(args).create()
    }

    /// Wraps a function or capability set so that calling it creates tasks.
    pub fn wrap_lazy<L: Lazify>(&self, target: L) -> L::Lazy {
        target.lazify(self.ids.clone(), None)
    }

    pub fn task_list(&self) -> TaskList {
        self.task_list_with(TaskListOptions::default())
    }

    pub fn task_list_with(&self, options: TaskListOptions) -> TaskList {
        TaskList::new(self.ids.clone(), options)
    }
}

/// Configuration for an [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    first_id: u64,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self { first_id: 1 }
    }
}

impl EngineBuilder {
    /// Identifier given to the first task.
    pub fn first_id(mut self, first_id: u64) -> Self {
        self.first_id = first_id;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            ids: TaskIds::starting_at(self.first_id),
        }
    }
}
