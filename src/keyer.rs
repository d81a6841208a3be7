use std::fmt::Write;

use rustc_hash::FxHashMap;

use crate::{Args, Value};

/// Turns resolved formula arguments into cache keys.
///
/// Primitives contribute their own value. Reference values contribute a
/// surrogate id that is assigned the first time a reference is seen and
/// reused for it from then on. Two distinct references never share a
/// surrogate, even when their contents are equal.
///
/// The keyer holds on to every reference it has seen, so an address is never
/// recycled for a different object while its surrogate is still known.
#[derive(Default)]
pub struct Keyer {
    identities: FxHashMap<usize, Identity>,
}

struct Identity {
    id: usize,
    /// Keeps the allocation alive.
    _object: Value,
}

impl Keyer {
    /// Create a keyer that has not seen any references yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of distinct references seen so far.
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Build the cache key for a set of arguments.
    ///
    /// The key starts with `$` and appends `|` plus one contribution per
    /// argument. Keyed arguments are written as `name=contribution`.
    pub fn key(&mut self, args: &Args) -> String {
        let mut key = String::from("$");
        match args {
            Args::List(values) => {
                for value in values {
                    key.push('|');
                    self.write(&mut key, value);
                }
            }
            Args::Keyed(entries) => {
                for (name, value) in entries {
                    key.push('|');
                    write_str(&mut key, name);
                    key.push('=');
                    self.write(&mut key, value);
                }
            }
        }
        key
    }

    /// The surrogate id of a reference value, assigning a fresh one if
    /// needed. Primitives have none.
    pub fn surrogate(&mut self, value: &Value) -> Option<usize> {
        let address = value.address()?;
        let next = self.identities.len();
        let identity = self
            .identities
            .entry(address)
            .or_insert_with(|| Identity { id: next, _object: value.clone() });
        Some(identity.id)
    }

    fn write(&mut self, key: &mut String, value: &Value) {
        // Every contribution is self-delimiting: numbers and surrogates never
        // contain `|`, strings carry their byte length.
        let _ = match value {
            Value::Null => write!(key, "z"),
            Value::Bool(true) => write!(key, "t"),
            Value::Bool(false) => write!(key, "f"),
            Value::Int(v) => write!(key, "i{v}"),
            // Zeroes share one key, as do all NaNs.
            Value::Float(v) => write!(key, "d{:?}", if *v == 0.0 { 0.0 } else { *v }),
            Value::Str(v) => {
                write_str(key, v);
                Ok(())
            }
            Value::List(_) | Value::Map(_) | Value::Opaque(_) => match self.surrogate(value) {
                Some(id) => write!(key, "o{id}"),
                None => Ok(()),
            },
        };
    }
}

fn write_str(key: &mut String, s: &str) {
    let _ = write!(key, "s{}:{s}", s.len());
}
