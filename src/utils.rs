use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::TaskError;

/// Locks a mutex, recovering the guard if a previous holder panicked. User
/// code never runs under one of our locks, so the protected state is still
/// consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown payload")
    }
}

/// Runs user code, turning both returned errors and panics into
/// [`TaskError`]s.
pub(crate) fn guarded<R>(f: impl FnOnce() -> anyhow::Result<R>) -> Result<R, TaskError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TaskError::from(err)),
        Err(panic) => Err(TaskError::Panicked(panic_message(panic))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_ok() {
        assert_eq!(guarded(|| Ok(3)).unwrap(), 3);
    }

    #[test]
    fn test_guarded_error() {
        let err = guarded::<()>(|| Err(anyhow::anyhow!("nope"))).unwrap_err();
        assert!(matches!(err, TaskError::Failed(_)));
    }

    #[test]
    fn test_guarded_panic() {
        let err = guarded::<()>(|| panic!("boom")).unwrap_err();
        match err {
            TaskError::Panicked(msg) => assert_eq!(msg, "boom"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
