//! Write-once value cell with a callback chain.
//!
//! A [`Future`] starts out pending. Callbacks registered while pending are
//! queued and invoked in registration order once [`Future::set`] is called.
//! Callbacks registered after that are invoked straight away, on the calling
//! thread, with the stored value.
//!
//! This is not a [`std::future::Future`]: nothing polls it. It is the
//! synchronisation primitive tasks use to wait for arguments that are not
//! known yet.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use crate::error::FutureError;
use crate::utils::lock;

type Callback<T> = Box<dyn FnOnce(T) + Send>;

enum State<T> {
    Pending(Vec<Callback<T>>),
    Resolved(T),
}

/// A handle to a write-once value cell. Clones share the same cell.
pub struct Future<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Future<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::Pending(Vec::new()))),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(*lock(&self.state), State::Resolved(_))
    }

    /// Returns a copy of the value, if the future has been resolved.
    pub fn value(&self) -> Option<T> {
        match &*lock(&self.state) {
            State::Resolved(value) => Some(value.clone()),
            State::Pending(_) => None,
        }
    }

    /// Resolves the future and runs every queued callback in registration
    /// order.
    pub fn set(&self, value: T) -> Result<(), FutureError> {
        let callbacks = {
            let mut state = lock(&self.state);
            let callbacks = match &mut *state {
                State::Resolved(_) => return Err(FutureError::AlreadyResolved),
                State::Pending(callbacks) => std::mem::take(callbacks),
            };
            *state = State::Resolved(value.clone());
            callbacks
        };

        tracing::trace!(callbacks = callbacks.len(), "future resolved");

        for callback in callbacks {
            callback(value.clone());
        }

        Ok(())
    }

    /// Registers a callback. If the future is already resolved the callback
    /// runs immediately, before this call returns.
    pub fn add_callback<F>(&self, callback: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        let value = {
            let mut state = lock(&self.state);
            match &mut *state {
                State::Pending(callbacks) => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                State::Resolved(value) => value.clone(),
            }
        };

        callback(value);
    }

    /// Whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl<T> Default for Future<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> PartialEq for Future<T>
where
    T: Clone + Send + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Debug for Future<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*lock(&self.state) {
            State::Pending(callbacks) => write!(f, "Future(pending, {} callbacks)", callbacks.len()),
            State::Resolved(value) => write!(f, "Future({value:?})"),
        }
    }
}
