use std::sync::{Arc, Mutex};

use crate::core::Arg;
use crate::engine::{SignalHook, Task};
use crate::error::TaskError;
use crate::utils::{guarded, lock};

/// Handed to callback-style functions. The task stays [`Running`] until the
/// function has returned *and* this handle has been signaled through
/// [`Completion::complete`] or [`Completion::fail`].
///
/// Dropping the handle without signaling settles the task with
/// [`TaskError::Abandoned`].
///
/// [`Running`]: crate::Status::Running
pub struct Completion {
    settle: Option<Arc<Settle>>,
}

impl Completion {
    pub(crate) fn new(settle: Arc<Settle>) -> Self {
        Self {
            settle: Some(settle),
        }
    }

    /// Signals success. The values are passed to the task's signal hook, if
    /// one was registered; an error raised by the hook becomes the task's
    /// error.
    pub fn complete(mut self, values: Vec<Arg>) {
        if let Some(settle) = self.settle.take() {
            settle.signal_values(values);
        }
    }

    /// Signals failure without calling the hook.
    pub fn fail(mut self, err: impl Into<anyhow::Error>) {
        if let Some(settle) = self.settle.take() {
            settle.signal(Err(TaskError::from(err.into())));
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(settle) = self.settle.take() {
            settle.signal(Err(TaskError::Abandoned));
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.settle {
            Some(settle) => write!(f, "Completion({})", settle.task.id()),
            None => write!(f, "Completion(signaled)"),
        }
    }
}

#[derive(Default)]
struct SettleState {
    returned: Option<Arg>,
    signal: Option<Result<(), TaskError>>,
    hook: Option<SignalHook>,
    settled: bool,
}

/// Joins the two halves of a callback-style call: the function's return
/// value and the completion signal. Whichever arrives last settles the task.
pub(crate) struct Settle {
    task: Task,
    state: Mutex<SettleState>,
}

impl Settle {
    pub(crate) fn new(task: Task, hook: Option<SignalHook>) -> Arc<Self> {
        Arc::new(Self {
            task,
            state: Mutex::new(SettleState {
                hook,
                ..Default::default()
            }),
        })
    }

    fn signal_values(&self, values: Vec<Arg>) {
        let hook = lock(&self.state).hook.take();
        let signal = match hook {
            Some(hook) => guarded(|| hook(values)),
            None => Ok(()),
        };
        self.signal(signal);
    }

    fn signal(&self, signal: Result<(), TaskError>) {
        let outcome = {
            let mut state = lock(&self.state);
            if state.settled {
                return;
            }
            match state.returned.take() {
                Some(value) => {
                    state.settled = true;
                    signal.map(|()| value)
                }
                None => {
                    state.signal = Some(signal);
                    return;
                }
            }
        };

        self.task.finish(outcome);
    }

    /// Records what the function itself returned. An error settles the task
    /// right away.
    pub(crate) fn returned(&self, returned: Result<Arg, TaskError>) {
        let outcome = {
            let mut state = lock(&self.state);
            if state.settled {
                return;
            }
            match returned {
                Err(err) => {
                    state.settled = true;
                    Err(err)
                }
                Ok(value) => match state.signal.take() {
                    Some(signal) => {
                        state.settled = true;
                        signal.map(|()| value)
                    }
                    None => {
                        state.returned = Some(value);
                        return;
                    }
                },
            }
        };

        self.task.finish(outcome);
    }
}
