//! Memoized derived values over external state.
//!
//! A [`Formula`] declares its dependencies, either other formulas or fixed
//! values, and derives a value from them. Formulas of one type share a
//! bounded memo store: when the resolved dependencies are the same as in a
//! recent calculation, the stored value is handed out again instead of being
//! recomputed. Primitives are compared by value, lists, maps and opaque values
//! by reference.

mod args;
mod formula;
mod keyer;
mod path;
pub mod profile;
mod registry;
mod schedule;
mod select;
mod store;
#[cfg(feature = "testing")]
mod testing;
mod value;

pub use crate::args::Args;
pub use crate::formula::{Calculate, Dependencies, Dependency, Formula, Identity, Recipe};
pub use crate::keyer::Keyer;
pub use crate::path::{Path, get};
pub use crate::registry::{Registry, Slot, evict};
pub use crate::schedule::{IdleHandle, IdleQueue, Immediate, Job, Scheduler};
pub use crate::select::{Select, select};
pub use crate::store::{DEFAULT_CAPACITY, MemoStore};
pub use crate::value::Value;

/// These are implementation details. Do not rely on them!
#[doc(hidden)]
pub mod internal {
    #[cfg(feature = "testing")]
    pub use crate::testing::last_was_hit;
}
