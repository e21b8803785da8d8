use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;

use crate::future::Future;

/// A type-erased, thread-safe container.
pub type Dynamic = Arc<dyn Any + Send + Sync>;

/// Free-form metadata attached to a task.
pub type Notes = serde_json::Map<String, Value>;

/// A single task argument.
///
/// Arguments form a tree. [`Arg::Seq`] and [`Arg::Map`] are walked when a
/// task is created, and every [`Arg::Future`] found along the way becomes a
/// dependency of that task. [`Arg::Value`] and [`Arg::Opaque`] are leaves:
/// JSON arrays and objects are plain data and are never searched for
/// futures.
#[derive(Clone)]
pub enum Arg {
    /// Plain data.
    Value(Value),
    /// A value the engine cannot look inside.
    Opaque(Dynamic),
    /// A value that will be known later.
    Future(Future<Arg>),
    /// An ordered sequence of arguments.
    Seq(Vec<Arg>),
    /// A keyed mapping of arguments.
    Map(BTreeMap<String, Arg>),
}

impl Arg {
    pub fn null() -> Self {
        Arg::Value(Value::Null)
    }

    /// Wraps any thread-safe value as an opaque leaf.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Arg::Opaque(Arc::new(value))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Arg]> {
        match self {
            Arg::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Arg>> {
        match self {
            Arg::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_future(&self) -> Option<&Future<Arg>> {
        match self {
            Arg::Future(future) => Some(future),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Arg::Opaque(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn is_future(&self) -> bool {
        matches!(self, Arg::Future(_))
    }
}

impl Default for Arg {
    fn default() -> Self {
        Arg::null()
    }
}

impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Arg::Value(a), Arg::Value(b)) => a == b,
            (Arg::Opaque(a), Arg::Opaque(b)) => Arc::ptr_eq(a, b),
            (Arg::Future(a), Arg::Future(b)) => a.ptr_eq(b),
            (Arg::Seq(a), Arg::Seq(b)) => a == b,
            (Arg::Map(a), Arg::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Value(value) => write!(f, "{value}"),
            Arg::Opaque(_) => write!(f, "Opaque(*)"),
            Arg::Future(future) => write!(f, "{future:?}"),
            Arg::Seq(items) => f.debug_list().entries(items).finish(),
            Arg::Map(map) => f.debug_map().entries(map).finish(),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<Future<Arg>> for Arg {
    fn from(future: Future<Arg>) -> Self {
        Arg::Future(future)
    }
}

impl From<&Future<Arg>> for Arg {
    fn from(future: &Future<Arg>) -> Self {
        Arg::Future(future.clone())
    }
}

impl From<Vec<Arg>> for Arg {
    fn from(items: Vec<Arg>) -> Self {
        Arg::Seq(items)
    }
}

impl From<BTreeMap<String, Arg>> for Arg {
    fn from(map: BTreeMap<String, Arg>) -> Self {
        Arg::Map(map)
    }
}

macro_rules! impl_from_scalar {
    ($($T:ty),*) => {
        $(
            impl From<$T> for Arg {
                fn from(value: $T) -> Self {
                    Arg::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_from_scalar!(bool, i32, i64, u32, u64, f64, String, &str);

/// One step from a container to one of its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Seg {
    Index(usize),
    Key(String),
}

/// Location of an argument inside the top-level argument list.
pub(crate) type Path = Vec<Seg>;

/// Finds the argument at `path`, if the tree still has that shape.
pub(crate) fn slot_mut<'a>(args: &'a mut [Arg], path: &[Seg]) -> Option<&'a mut Arg> {
    let (first, rest) = path.split_first()?;
    let Seg::Index(index) = first else {
        return None;
    };

    let mut current = args.get_mut(*index)?;
    for seg in rest {
        current = match (seg, current) {
            (Seg::Index(i), Arg::Seq(items)) => items.get_mut(*i)?,
            (Seg::Key(k), Arg::Map(map)) => map.get_mut(k)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Merges `incoming` into `notes`. Nested objects merge key by key, any other
/// value replaces what was stored.
pub(crate) fn merge_notes(notes: &mut Notes, incoming: impl IntoIterator<Item = (String, Value)>) {
    for (key, value) in incoming {
        match notes.get_mut(&key) {
            Some(Value::Object(stored)) if value.is_object() => {
                if let Value::Object(nested) = value {
                    merge_notes(stored, nested);
                }
            }
            _ => {
                notes.insert(key, value);
            }
        }
    }
}
