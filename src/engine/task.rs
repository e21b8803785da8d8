use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::core::{Arg, Notes, Seg, merge_notes, slot_mut};
use crate::engine::completion::{Completion, Settle};
use crate::engine::scan::scan;
use crate::engine::{Func, Mode, SignalHook, Status, TaskId, TaskIds, TaskInfo};
use crate::error::{CancelError, TaskError};
use crate::utils::{guarded, lock};

type OnComplete = Box<dyn FnOnce(Result<Arg, TaskError>) + Send>;

struct State {
    status: Status,
    /// Set by the first call to `run`, independent of `status`.
    called: bool,
    args: Vec<Arg>,
    /// Argument positions still holding an unresolved future.
    pending: usize,
    notes: Notes,
    hook: Option<SignalHook>,
    on_complete: Option<OnComplete>,
}

struct Shared {
    id: TaskId,
    func: Func,
    state: Mutex<State>,
}

/// A deferred function call. Cloning yields another handle to the same task.
#[derive(Clone)]
pub struct Task {
    shared: Arc<Shared>,
}

impl Task {
    fn new(id: TaskId, func: Func, mut args: Vec<Arg>, hook: Option<SignalHook>, notes: Notes) -> Self {
        let dependencies = scan(&args);

        // The futures own callbacks holding this task, so the task must not
        // hold the futures back.
        for (path, _) in &dependencies {
            if let Some(slot) = slot_mut(&mut args, path) {
                *slot = Arg::null();
            }
        }

        let task = Task {
            shared: Arc::new(Shared {
                id,
                func,
                state: Mutex::new(State {
                    status: Status::Procrastinating,
                    called: false,
                    args,
                    pending: dependencies.len(),
                    notes,
                    hook,
                    on_complete: None,
                }),
            }),
        };

        tracing::debug!(task = %id, dependencies = dependencies.len(), "task created");

        // Futures that are already resolved call back immediately and fill in
        // their slot before this loop moves on.
        for (path, future) in dependencies {
            let task = task.clone();
            future.add_callback(move |value| task.resolve(&path, value));
        }

        task
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn status(&self) -> Status {
        self.state().status
    }

    pub fn mode(&self) -> Mode {
        self.shared.func.mode()
    }

    /// Number of argument positions still waiting on a future.
    pub fn pending(&self) -> usize {
        self.state().pending
    }

    /// Whether `run` has been called on this task.
    pub fn was_run(&self) -> bool {
        self.state().called
    }

    /// Asks the task to run. The function is invoked as soon as every
    /// dependency has resolved, which may be before this call returns.
    ///
    /// `on_complete` receives the function's return value, or the reason the
    /// task could not run or failed. Running twice or running a canceled task
    /// is reported through `on_complete` and leaves the task untouched.
    pub fn run<F>(&self, on_complete: F)
    where
        F: FnOnce(Result<Arg, TaskError>) + Send + 'static,
    {
        let mut state = self.state();

        let rejection = if state.called {
            Some(TaskError::AlreadyRan)
        } else if state.status == Status::Canceled {
            Some(TaskError::Canceled)
        } else {
            None
        };

        if let Some(err) = rejection {
            drop(state);
            tracing::debug!(task = %self.id(), error = %err, "run rejected");
            on_complete(Err(err));
            return;
        }

        state.called = true;
        state.on_complete = Some(Box::new(on_complete));
        drop(state);

        self.maybe_execute();
    }

    /// Same as [`Task::run`], discarding the outcome.
    pub fn run_detached(&self) {
        self.run(|_| {});
    }

    /// Cancels a task that has not started executing.
    ///
    /// Returns `Ok(true)` if the task was canceled, `Ok(false)` if it is
    /// already running or done. Canceling twice is an error. If the task was
    /// run and is still waiting on dependencies, its run callback receives
    /// [`TaskError::Canceled`].
    pub fn cancel(&self) -> Result<bool, CancelError> {
        let on_complete = {
            let mut state = self.state();
            match state.status {
                Status::Canceled => return Err(CancelError::AlreadyCanceled),
                Status::Running | Status::Done => return Ok(false),
                Status::Procrastinating => {
                    state.status = Status::Canceled;
                    state.hook = None;
                    state.on_complete.take()
                }
            }
        };

        tracing::debug!(task = %self.id(), "task canceled");

        if let Some(on_complete) = on_complete {
            on_complete(Err(TaskError::Canceled));
        }

        Ok(true)
    }

    /// Merges metadata into the task's notes. Nested objects merge key by
    /// key, everything else overwrites.
    pub fn note<I, K>(&self, notes: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut state = self.state();
        merge_notes(
            &mut state.notes,
            notes.into_iter().map(|(key, value)| (key.into(), value)),
        );
    }

    /// Returns the id, status and a copy of the notes.
    pub fn info(&self) -> TaskInfo {
        let state = self.state();
        TaskInfo {
            id: self.shared.id,
            status: state.status,
            notes: state.notes.clone(),
        }
    }

    /// Whether both handles refer to the same task.
    pub fn ptr_eq(&self, other: &Task) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.shared.state)
    }

    fn resolve(&self, path: &[Seg], value: Arg) {
        {
            let mut state = self.state();
            if let Some(slot) = slot_mut(&mut state.args, path) {
                *slot = value;
            }
            state.pending = state.pending.saturating_sub(1);
            tracing::trace!(task = %self.id(), pending = state.pending, "dependency resolved");
        }

        self.maybe_execute();
    }

    fn maybe_execute(&self) {
        let (args, hook) = {
            let mut state = self.state();
            if state.status != Status::Procrastinating || !state.called || state.pending > 0 {
                return;
            }
            state.status = Status::Running;
            (std::mem::take(&mut state.args), state.hook.take())
        };

        tracing::debug!(task = %self.id(), mode = ?self.mode(), "task running");

        match &self.shared.func {
            Func::Sync(func) => {
                let outcome = guarded(|| func(args));
                self.finish(outcome);
            }
            Func::Callback(func) => {
                let settle = Settle::new(self.clone(), hook);
                let completion = Completion::new(settle.clone());
                let returned = guarded(|| func(args, completion));
                settle.returned(returned);
            }
        }
    }

    pub(crate) fn finish(&self, outcome: Result<Arg, TaskError>) {
        let on_complete = {
            let mut state = self.state();
            state.status = Status::Done;
            state.on_complete.take()
        };

        match &outcome {
            Ok(_) => tracing::debug!(task = %self.id(), "task done"),
            Err(err) => tracing::debug!(task = %self.id(), error = %err, "task done with error"),
        }

        if let Some(on_complete) = on_complete {
            on_complete(outcome);
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task({}, {})", self.id(), self.status())
    }
}

/// Collects everything needed to create a [`Task`].
pub struct TaskBuilder {
    ids: TaskIds,
    func: Func,
    args: Vec<Arg>,
    hook: Option<SignalHook>,
    notes: Notes,
}

impl TaskBuilder {
    pub fn new(ids: TaskIds, func: Func) -> Self {
        Self {
            ids,
            func,
            args: Vec::new(),
            hook: None,
            notes: Notes::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Registers the hook called with the values a callback-style function
    /// passes to [`Completion::complete`]. Ignored for synchronous functions.
    pub fn on_signal<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(Vec<Arg>) -> anyhow::Result<()> + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn note(mut self, key: impl Into<String>, value: Value) -> Self {
        merge_notes(&mut self.notes, [(key.into(), value)]);
        self
    }

    /// Creates the task, drawing its id from the generator.
    pub fn create(self) -> Task {
        Task::new(self.ids.next_id(), self.func, self.args, self.hook, self.notes)
    }
}
