use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// A dynamically typed value that formulas read from state and produce.
///
/// Primitives are compared by value. Lists, maps and opaque values live
/// behind a shared pointer: cloning them hands out the _same_ reference, and
/// the cache keys formulas by that reference rather than by contents.
#[derive(Clone, Default)]
pub enum Value {
    /// The absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// An immutable string.
    Str(Arc<str>),
    /// A shared, ordered sequence of values.
    List(Arc<Vec<Value>>),
    /// A shared mapping from string keys to values.
    Map(Arc<BTreeMap<String, Value>>),
    /// Any other shared host object, for example a function.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Create a new list.
    pub fn list<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
        Self::List(Arc::new(values.into_iter().map(Into::into).collect()))
    }

    /// Create a new map.
    pub fn map<K, T>(entries: impl IntoIterator<Item = (K, T)>) -> Self
    where
        K: Into<String>,
        T: Into<Value>,
    {
        Self::Map(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }

    /// Wrap an arbitrary host object.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self::Opaque(Arc::new(value))
    }

    /// The name of the value's variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Whether this value is compared by value rather than by reference.
    pub fn is_primitive(&self) -> bool {
        self.address().is_none()
    }

    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    /// The number as a float. Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(v),
            Self::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// The list's elements, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// The map's entries, if this is a map.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Downcast an opaque value to a concrete host type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Opaque(v) => v.downcast_ref(),
            _ => None,
        }
    }

    /// Look up one path segment: a key in a map or an index into a list.
    pub fn get(&self, segment: &str) -> Option<&Value> {
        match self {
            Self::Map(map) => map.get(segment),
            Self::List(list) => segment.parse::<usize>().ok().and_then(|i| list.get(i)),
            _ => None,
        }
    }

    /// Whether two values are the same: equal primitives or the very same
    /// reference. Values that are the same produce the same cache key.
    ///
    /// Unlike `==`, any NaN is the same as any other NaN.
    pub fn same(&self, other: &Self) -> bool {
        match (self.address(), other.address()) {
            (None, None) => match (self, other) {
                (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
                _ => self == other,
            },
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// The address of the shared allocation behind a reference value.
    pub(crate) fn address(&self) -> Option<usize> {
        match self {
            Self::List(v) => Some(Arc::as_ptr(v) as *const () as usize),
            Self::Map(v) => Some(Arc::as_ptr(v) as *const () as usize),
            Self::Opaque(v) => Some(Arc::as_ptr(v) as *const () as usize),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Opaque(_), Self::Opaque(_)) => self.address() == other.address(),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Null => f.pad("null"),
            Self::Bool(v) => v.fmt(f),
            Self::Int(v) => v.fmt(f),
            Self::Float(v) => v.fmt(f),
            Self::Str(v) => v.fmt(f),
            Self::List(v) => f.debug_list().entries(v.iter()).finish(),
            Self::Map(v) => f.debug_map().entries(v.iter()).finish(),
            Self::Opaque(_) => f.pad("<opaque>"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(Arc::new(v))
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(Arc::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Null
    }
}
