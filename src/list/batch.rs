use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::core::Arg;
use crate::engine::Task;
use crate::error::TaskError;
use crate::utils::{lock, panic_message};

pub(crate) type OnEach = Box<dyn FnMut(&Settled) + Send>;
pub(crate) type OnAll = Box<dyn FnOnce(Vec<Settled>) + Send>;

/// Outcome of one task in a [`TaskList::run`](crate::TaskList::run).
#[derive(Debug, Clone)]
pub struct Settled {
    pub task: Task,
    pub outcome: Result<Arg, TaskError>,
    /// Time between the start of the batch and this task settling.
    pub elapsed: Duration,
}

impl Settled {
    pub fn error(&self) -> Option<&TaskError> {
        self.outcome.as_ref().err()
    }

    pub fn result(&self) -> Option<&Arg> {
        self.outcome.as_ref().ok()
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

struct State {
    remaining: usize,
    /// Settled tasks waiting for `on_each`, in settlement order.
    queue: VecDeque<Settled>,
    dispatching: bool,
    on_each: Option<OnEach>,
    on_all: Option<OnAll>,
    results: Vec<Settled>,
}

impl State {
    /// Hands out `on_all` once nothing is left to settle or deliver.
    fn finished(&mut self) -> Option<(OnAll, Vec<Settled>)> {
        if self.remaining > 0 || !self.queue.is_empty() {
            return None;
        }
        let on_all = self.on_all.take()?;
        Some((on_all, std::mem::take(&mut self.results)))
    }
}

/// Bookkeeping for one run of a task list.
///
/// A task can settle while `on_each` is still handling another one, either
/// because the callback itself resolved a future or because the task
/// finished on another thread. Such outcomes are queued and delivered by
/// whoever is already dispatching, so callbacks never overlap and never run
/// under the lock.
pub(crate) struct Batch {
    list: String,
    started: Instant,
    state: Mutex<State>,
}

impl Batch {
    pub(crate) fn new(list: String, total: usize, on_each: OnEach, on_all: OnAll) -> Arc<Self> {
        Arc::new(Self {
            list,
            started: Instant::now(),
            state: Mutex::new(State {
                remaining: total,
                queue: VecDeque::with_capacity(total),
                dispatching: false,
                on_each: Some(on_each),
                on_all: Some(on_all),
                results: Vec::with_capacity(total),
            }),
        })
    }

    pub(crate) fn settle(&self, task: Task, outcome: Result<Arg, TaskError>) {
        {
            let mut state = lock(&self.state);
            state.queue.push_back(Settled {
                task,
                outcome,
                elapsed: self.started.elapsed(),
            });
            if state.dispatching {
                return;
            }
            state.dispatching = true;
        }

        self.dispatch();
    }

    /// Drops a task from the batch without reporting it, for tasks canceled
    /// after the batch started but before they were run.
    pub(crate) fn skip(&self, task: &Task) {
        let finished = {
            let mut state = lock(&self.state);
            state.remaining = state.remaining.saturating_sub(1);
            if state.dispatching {
                None
            } else {
                state.finished()
            }
        };

        tracing::debug!(list = %self.list, task = %task.id(), "skipping canceled task");

        if let Some((on_all, results)) = finished {
            self.complete(on_all, results);
        }
    }

    fn dispatch(&self) {
        loop {
            let (settled, mut on_each) = {
                let mut state = lock(&self.state);
                match state.queue.pop_front() {
                    Some(settled) => (settled, state.on_each.take()),
                    None => {
                        state.dispatching = false;
                        let finished = state.finished();
                        drop(state);
                        if let Some((on_all, results)) = finished {
                            self.complete(on_all, results);
                        }
                        return;
                    }
                }
            };

            match &settled.outcome {
                Ok(_) => tracing::debug!(list = %self.list, task = %settled.task.id(), "task settled"),
                Err(err) => tracing::debug!(
                    list = %self.list,
                    task = %settled.task.id(),
                    error = %err,
                    "task settled with error"
                ),
            }

            if let Some(on_each) = on_each.as_mut() {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| on_each(&settled))) {
                    tracing::error!(
                        list = %self.list,
                        task = %settled.task.id(),
                        "on_each callback panicked: {}",
                        panic_message(panic)
                    );
                }
            }

            let mut state = lock(&self.state);
            state.on_each = on_each;
            state.results.push(settled);
            state.remaining = state.remaining.saturating_sub(1);
        }
    }

    fn complete(&self, on_all: OnAll, results: Vec<Settled>) {
        let failed = results.iter().filter(|s| !s.is_ok()).count();
        tracing::info!(
            list = %self.list,
            settled = results.len(),
            failed,
            elapsed = ?self.started.elapsed(),
            "task list finished"
        );
        on_all(results);
    }
}
