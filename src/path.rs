use std::fmt::{self, Debug, Formatter};

use crate::Value;

/// A path into a nested state value.
///
/// ```
/// # use formulary::Path;
/// assert_eq!(Path::from("user.name").segments(), ["user", "name"]);
/// assert!(Path::from("*").is_root());
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<String>);

impl Path {
    /// The path that selects the entire state.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Whether this path selects the entire state.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The individual segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for Path {
    /// Parse a dotted path. The wildcard `*` and the empty string select the
    /// entire state.
    fn from(path: &str) -> Self {
        match path {
            "" | "*" => Self::root(),
            _ => Self(path.split('.').map(Into::into).collect()),
        }
    }
}

impl From<String> for Path {
    fn from(path: String) -> Self {
        path.as_str().into()
    }
}

impl From<&[&str]> for Path {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|&s| s.into()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(segments: [&str; N]) -> Self {
        segments.as_slice().into()
    }
}

impl Debug for Path {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.is_root() {
            f.pad("*")
        } else {
            f.pad(&self.0.join("."))
        }
    }
}

/// Read a possibly nested path out of a state container.
///
/// Returns `fallback` as soon as a segment does not resolve. The root path
/// yields the container itself.
pub fn get(container: &Value, path: &Path, fallback: Value) -> Value {
    let mut current = container;
    for segment in path.segments() {
        match current.get(segment) {
            Some(next) => current = next,
            None => return fallback,
        }
    }
    current.clone()
}
