use std::sync::Arc;

use crate::Value;

/// The resolved dependencies of a formula, in the shape they were declared.
#[derive(Debug, Clone, PartialEq)]
pub enum Args {
    /// Positional arguments.
    List(Vec<Value>),
    /// Named arguments in declaration order.
    Keyed(Vec<(Arc<str>, Value)>),
}

impl Args {
    /// The number of arguments.
    pub fn len(&self) -> usize {
        match self {
            Self::List(values) => values.len(),
            Self::Keyed(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A named argument. Positional arguments have no names.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Self::List(_) => None,
            Self::Keyed(entries) => {
                entries.iter().find(|(n, _)| &**n == name).map(|(_, v)| v)
            }
        }
    }

    /// The argument at `index` in declaration order.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Self::List(values) => values.get(index),
            Self::Keyed(entries) => entries.get(index).map(|(_, v)| v),
        }
    }

    /// Iterate over the argument values in declaration order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        let (list, keyed) = match self {
            Self::List(values) => (Some(values.iter()), None),
            Self::Keyed(entries) => (None, Some(entries.iter().map(|(_, v)| v))),
        };
        list.into_iter().flatten().chain(keyed.into_iter().flatten())
    }

    /// Hand the arguments back unchanged as a single value.
    ///
    /// A lone positional argument is returned as itself. Otherwise positional
    /// arguments become a list and named ones a map.
    pub fn into_value(self) -> Value {
        match self {
            Self::List(mut values) if values.len() == 1 => values.swap_remove(0),
            Self::List(values) => values.into(),
            Self::Keyed(entries) => {
                Value::map(entries.into_iter().map(|(n, v)| (n.to_string(), v)))
            }
        }
    }
}
