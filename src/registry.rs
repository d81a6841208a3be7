use std::any::TypeId;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::schedule::{Immediate, Scheduler};
use crate::{Args, Keyer, MemoStore, Recipe, Value};

/// The process-wide registry used by [`Formula::new`](crate::Formula::new).
static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Drop every memoized result in the global registry.
pub fn evict() {
    Registry::global().evict();
}

/// Hands out the shared cache of each formula type.
///
/// Every formula type gets exactly one [`Slot`], created the first time a
/// formula of that type is constructed against this registry. All instances
/// of the type then share it.
pub struct Registry {
    slots: RwLock<FxHashMap<TypeId, Arc<Slot>>>,
    scheduler: Arc<dyn Scheduler>,
}

impl Registry {
    /// Create an empty registry whose stores clean up synchronously.
    pub fn new() -> Self {
        Self::with_scheduler(Arc::new(Immediate))
    }

    /// Create an empty registry whose stores defer cleanup to `scheduler`.
    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self { slots: RwLock::new(FxHashMap::default()), scheduler }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// The slot of the formula type `R`, creating it on first use.
    pub fn slot<R: Recipe>(&self) -> Arc<Slot> {
        let id = TypeId::of::<R>();
        if let Some(slot) = self.slots.read().get(&id) {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write();
        let slot = slots.entry(id).or_insert_with(|| {
            let name = short_name(std::any::type_name::<R>());
            tracing::trace!(name, capacity = R::CAPACITY, "registered formula type");
            Arc::new(Slot {
                name,
                keyer: Mutex::new(Keyer::new()),
                store: MemoStore::with_capacity(R::CAPACITY, Arc::clone(&self.scheduler)),
            })
        });
        Arc::clone(slot)
    }

    /// The number of formula types with a slot.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every memoized result of every formula type.
    ///
    /// Surrogate ids are kept, so a reference seen before keeps its id.
    pub fn evict(&self) {
        for slot in self.slots.read().values() {
            slot.store.clear();
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_list().entries(self.slots.read().values()).finish()
    }
}

/// The identity keyer and memo store shared by all formulas of one type.
pub struct Slot {
    name: &'static str,
    keyer: Mutex<Keyer>,
    store: MemoStore<Value>,
}

impl Slot {
    /// The formula type's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build the cache key for resolved arguments.
    pub fn key(&self, args: &Args) -> String {
        self.keyer.lock().key(args)
    }

    /// The number of distinct references this type has keyed.
    pub fn identities(&self) -> usize {
        self.keyer.lock().len()
    }

    /// The memoized results.
    pub fn store(&self) -> &MemoStore<Value> {
        &self.store
    }
}

impl Debug for Slot {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.name)
            .field("store", &self.store)
            .finish()
    }
}

/// Strip the module path from a type name, keeping generic arguments intact.
fn short_name(full: &'static str) -> &'static str {
    let base = full.find('<').map_or(full, |i| &full[..i]);
    match base.rfind("::") {
        Some(i) => &full[i + 2..],
        None => full,
    }
}
