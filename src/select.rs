use parking_lot::Mutex;

use crate::path::{self, Path};
use crate::{Calculate, Value};

/// Select the value at `path` from the state.
///
/// `"*"` selects the entire state.
pub fn select(path: impl Into<Path>) -> Select {
    Select::new(path)
}

/// A formula that reads one path out of the state.
///
/// Selections bypass the memo store. Every calculation reads the state afresh
/// and a missing path yields null.
#[derive(Debug)]
pub struct Select {
    path: Path,
    value: Mutex<Option<Value>>,
}

impl Select {
    /// Select `path` from the state. See [`select`].
    pub fn new(path: impl Into<Path>) -> Self {
        Self { path: path.into(), value: Mutex::new(None) }
    }

    /// The selected path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Calculate for Select {
    fn calculate(&self, state: &Value, _: &Value) -> Value {
        let value = path::get(state, &self.path, Value::Null);
        *self.value.lock() = Some(value.clone());
        value
    }

    fn value(&self) -> Option<Value> {
        self.value.lock().clone()
    }

    fn name(&self) -> &'static str {
        "Select"
    }
}
