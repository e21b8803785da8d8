//! Ordered collections of tasks that run as a batch.

mod batch;

use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::engine::{Status, Task, TaskIds};
use crate::lazy::Lazify;
use crate::list::batch::Batch;
use crate::utils::lock;

pub use crate::list::batch::Settled;

/// Settings for a new [`TaskList`].
#[derive(Debug, Clone, Default)]
pub struct TaskListOptions {
    /// Name used in log events. Defaults to `"tasks"`.
    pub name: Option<Cow<'static, str>>,
}

impl TaskListOptions {
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

struct Shared {
    name: Cow<'static, str>,
    ids: TaskIds,
    tasks: Mutex<Vec<Task>>,
}

/// An ordered, shared list of tasks.
///
/// The list only references its tasks: adding a task to a list changes
/// nothing about how it runs or cancels. Clones share the same list.
#[derive(Clone)]
pub struct TaskList {
    shared: Arc<Shared>,
}

impl TaskList {
    pub fn new(ids: TaskIds, options: TaskListOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: options.name.unwrap_or(Cow::Borrowed("tasks")),
                ids,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn add(&self, task: Task) {
        self.tasks().push(task);
    }

    /// Wraps a function or capability set so that every call creates a task
    /// and appends it to this list.
    pub fn lazy_wrap<L: Lazify>(&self, target: L) -> L::Lazy {
        target.lazify(self.shared.ids.clone(), Some(self.clone()))
    }

    /// Copy of the current sequence.
    pub fn to_vec(&self) -> Vec<Task> {
        self.tasks().clone()
    }

    /// Empties the list. Tasks keep whatever status they had.
    pub fn clear(&self) {
        self.tasks().clear();
    }

    pub fn len(&self) -> usize {
        self.tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks().is_empty()
    }

    /// Runs every task currently in the list.
    ///
    /// Canceled tasks are dropped from the list and skipped. The rest are
    /// run in list order; each one is removed from the list and reported to
    /// `on_each` as it settles, which may be long after this call returns.
    /// `on_all` receives every outcome, in settlement order, once the last
    /// task of this run has settled. With nothing to run, `on_all` is called
    /// immediately with an empty list.
    pub fn run<E, A>(&self, on_each: E, on_all: A)
    where
        E: FnMut(&Settled) + Send + 'static,
        A: FnOnce(Vec<Settled>) + Send + 'static,
    {
        let snapshot = self.to_vec();
        let (canceled, runnable): (Vec<_>, Vec<_>) = snapshot
            .into_iter()
            .partition(|task| task.status() == Status::Canceled);

        if !canceled.is_empty() {
            self.tasks()
                .retain(|task| !canceled.iter().any(|c| c.ptr_eq(task)));
        }

        tracing::debug!(
            list = %self.name(),
            tasks = runnable.len(),
            skipped = canceled.len(),
            "running task list"
        );

        if runnable.is_empty() {
            on_all(Vec::new());
            return;
        }

        let batch = Batch::new(
            self.name().to_string(),
            runnable.len(),
            Box::new(on_each),
            Box::new(on_all),
        );

        for task in runnable {
            // an earlier task's callback may have canceled this one
            if task.status() == Status::Canceled {
                self.tasks().retain(|t| !t.ptr_eq(&task));
                batch.skip(&task);
                continue;
            }

            let batch = batch.clone();
            let list = Arc::downgrade(&self.shared);
            let handle = task.clone();

            task.run(move |outcome| {
                remove(&list, &handle);
                batch.settle(handle, outcome);
            });
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<Task>> {
        lock(&self.shared.tasks)
    }
}

fn remove(list: &Weak<Shared>, task: &Task) {
    if let Some(shared) = list.upgrade() {
        lock(&shared.tasks).retain(|t| !t.ptr_eq(task));
    }
}

impl std::fmt::Debug for TaskList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskList")
            .field("name", &self.name())
            .field("tasks", &self.to_vec())
            .finish()
    }
}
