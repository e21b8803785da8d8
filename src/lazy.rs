//! Task-producing counterparts of functions and capability sets.
//!
//! Wrapping a [`Func`] yields a [`LazyFn`]: calling it creates a [`Task`]
//! instead of running anything. A [`Capabilities`] set is wrapped member by
//! member. Operations become [`LazyFn`]s and plain values pass through
//! unchanged, so the wrapped set has the same names and shape as the
//! original.
//!
//! When the wrapper was obtained from [`TaskList::lazy_wrap`], every task it
//! creates is appended to that list before being returned.

use std::collections::BTreeMap;

use crate::core::Arg;
use crate::engine::{Func, Mode, Task, TaskBuilder, TaskIds};
use crate::error::LazyError;
use crate::list::TaskList;

/// Things that can be turned into a task-producing counterpart.
pub trait Lazify {
    type Lazy;

    fn lazify(self, ids: TaskIds, list: Option<TaskList>) -> Self::Lazy;
}

/// A function whose calls produce tasks.
#[derive(Debug, Clone)]
pub struct LazyFn {
    func: Func,
    ids: TaskIds,
    list: Option<TaskList>,
}

impl LazyFn {
    pub fn mode(&self) -> Mode {
        self.func.mode()
    }

    /// Creates a task bound to `args`.
    pub fn call<I>(&self, args: I) -> Task
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.register(self.builder().args(args).create())
    }

    /// Creates a task bound to `args` whose completion signal is passed to
    /// `hook`.
    pub fn call_with<I, H>(&self, args: I, hook: H) -> Task
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
        H: FnOnce(Vec<Arg>) -> anyhow::Result<()> + Send + 'static,
    {
        self.register(self.builder().args(args).on_signal(hook).create())
    }

    fn builder(&self) -> TaskBuilder {
        TaskBuilder::new(self.ids.clone(), self.func.clone())
    }

    fn register(&self, task: Task) -> Task {
        if let Some(list) = &self.list {
            list.add(task.clone());
        }
        task
    }
}

impl Lazify for Func {
    type Lazy = LazyFn;

    fn lazify(self, ids: TaskIds, list: Option<TaskList>) -> LazyFn {
        LazyFn {
            func: self,
            ids,
            list,
        }
    }
}

/// A member of a [`Capabilities`] set.
#[derive(Debug, Clone)]
pub enum Member {
    Op(Func),
    Value(Arg),
}

/// A named set of operations and values, registered explicitly.
///
/// ```
/// use dawdle::{Arg, Capabilities, Engine, Func};
///
/// let engine = Engine::new();
/// let api = Capabilities::new()
///     .op("len", Func::sync(|args| Ok(Arg::from(args.len() as u64))))
///     .value("version", Arg::from(3));
///
/// let lazy = engine.wrap_lazy(api);
/// let task = lazy.call("len", [1, 2]).unwrap();
/// assert_eq!(lazy.value("version"), Some(&Arg::from(3)));
/// # task.run_detached();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    members: BTreeMap<String, Member>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(mut self, name: impl Into<String>, func: Func) -> Self {
        self.members.insert(name.into(), Member::Op(func));
        self
    }

    pub fn value(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.members.insert(name.into(), Member::Value(value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }
}

/// A member of a [`LazyCapabilities`] set.
#[derive(Debug, Clone)]
pub enum LazyMember {
    Op(LazyFn),
    Value(Arg),
}

/// The wrapped counterpart of a [`Capabilities`] set.
#[derive(Debug, Clone)]
pub struct LazyCapabilities {
    members: BTreeMap<String, LazyMember>,
}

impl LazyCapabilities {
    pub fn get(&self, name: &str) -> Option<&LazyMember> {
        self.members.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn op(&self, name: &str) -> Result<&LazyFn, LazyError> {
        match self.members.get(name) {
            Some(LazyMember::Op(lazy)) => Ok(lazy),
            Some(LazyMember::Value(_)) => Err(LazyError::NotCallable(name.to_string())),
            None => Err(LazyError::UnknownMember(name.to_string())),
        }
    }

    pub fn value(&self, name: &str) -> Option<&Arg> {
        match self.members.get(name) {
            Some(LazyMember::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Creates a task for the operation `name`.
    pub fn call<I>(&self, name: &str, args: I) -> Result<Task, LazyError>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        Ok(self.op(name)?.call(args))
    }
}

impl Lazify for Capabilities {
    type Lazy = LazyCapabilities;

    fn lazify(self, ids: TaskIds, list: Option<TaskList>) -> LazyCapabilities {
        let members = self
            .members
            .into_iter()
            .map(|(name, member)| {
                let member = match member {
                    Member::Op(func) => LazyMember::Op(func.lazify(ids.clone(), list.clone())),
                    Member::Value(value) => LazyMember::Value(value),
                };
                (name, member)
            })
            .collect();

        LazyCapabilities { members }
    }
}
