use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use slab::Slab;

use crate::schedule::{Immediate, Scheduler};

/// How many results a memo store keeps by default.
pub const DEFAULT_CAPACITY: usize = 30;

/// A bounded key-value table that forgets the least recently touched entries.
///
/// Reads and writes both count as touches. Writing past the capacity does not
/// evict right away: a single cleanup pass is handed to the store's
/// [`Scheduler`] and trims the stalest entries once it runs. Until then the
/// store may hold more entries than its capacity.
pub struct MemoStore<V> {
    shared: Arc<Shared<V>>,
    scheduler: Arc<dyn Scheduler>,
}

struct Shared<V> {
    entries: Mutex<Entries<V>>,
    capacity: usize,
    /// Whether a cleanup pass is scheduled but has not run yet.
    pending: AtomicBool,
}

impl<V> MemoStore<V> {
    /// Create a store with the default capacity that cleans up synchronously.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, Arc::new(Immediate))
    }

    /// Create a store with a custom capacity and cleanup scheduler.
    pub fn with_capacity(capacity: usize, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(Entries::new()),
                capacity,
                pending: AtomicBool::new(false),
            }),
            scheduler,
        }
    }

    /// The number of entries the store converges back to.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// The number of entries currently held.
    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an entry for `key` is present.
    pub fn has(&self, key: &str) -> bool {
        self.shared.entries.lock().find(key).is_some()
    }

    /// All keys from the stalest to the freshest.
    pub fn keys(&self) -> Vec<String> {
        self.shared.entries.lock().keys()
    }

    /// Whether a cleanup pass is waiting to run.
    pub fn is_clean_pending(&self) -> bool {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// Trim the store to its capacity now. Returns how many entries were
    /// evicted.
    ///
    /// A pass that is already scheduled stays scheduled and still counts as
    /// the one outstanding pass.
    pub fn clean(&self) -> usize {
        self.shared.trim(&mut self.shared.entries.lock())
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.shared.entries.lock().clear();
    }
}

impl<V: Clone> MemoStore<V> {
    /// Retrieve the value for `key` and mark it as the freshest entry.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.shared.entries.lock();
        let i = entries.find(key)?;
        entries.touch(i);
        Some(entries.nodes[i].value.clone())
    }
}

impl<V: Send + 'static> MemoStore<V> {
    /// Insert or overwrite the value for `key` as the freshest entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let overshoot = {
            let mut entries = self.shared.entries.lock();
            entries.insert(key.into(), value);
            entries.len() > self.shared.capacity
        };

        // Only one pass may be outstanding. It computes what to evict when it
        // runs, so entries added in the meantime are covered too.
        if overshoot && !self.shared.pending.swap(true, Ordering::SeqCst) {
            let shared = Arc::clone(&self.shared);
            let handle = self.scheduler.schedule(Box::new(move || {
                shared.scheduled_clean();
            }));
            tracing::trace!(?handle, "scheduled memo store cleanup");
        }
    }
}

impl<V> Shared<V> {
    /// The scheduled pass. Clears the pending flag under the entries lock so
    /// that a later overshoot schedules a fresh pass.
    fn scheduled_clean(&self) {
        let mut entries = self.entries.lock();
        self.pending.store(false, Ordering::SeqCst);
        self.trim(&mut entries);
    }

    fn trim(&self, entries: &mut Entries<V>) -> usize {
        let mut evicted = 0;
        while entries.len() > self.capacity {
            if entries.pop_front().is_none() {
                break;
            }
            evicted += 1;
        }

        if evicted > 0 {
            tracing::trace!(evicted, remaining = entries.len(), "cleaned memo store");
        }

        evicted
    }
}

impl<V> Default for MemoStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Debug for MemoStore<V> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("MemoStore")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("pending", &self.is_clean_pending())
            .finish()
    }
}

/// The entries in recency order, as a doubly linked list threaded through a
/// slab.
struct Entries<V> {
    nodes: Slab<Node<V>>,
    index: FxHashMap<String, usize>,
    /// The stalest entry.
    head: Option<usize>,
    /// The freshest entry.
    tail: Option<usize>,
}

struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<V> Entries<V> {
    fn new() -> Self {
        Self {
            nodes: Slab::new(),
            index: FxHashMap::default(),
            head: None,
            tail: None,
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn find(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    fn insert(&mut self, key: String, value: V) {
        if let Some(i) = self.find(&key) {
            self.nodes[i].value = value;
            self.touch(i);
            return;
        }

        let i = self.nodes.insert(Node { key: key.clone(), value, prev: None, next: None });
        self.index.insert(key, i);
        self.push_back(i);
    }

    /// Move a node to the freshest end.
    fn touch(&mut self, i: usize) {
        if self.tail != Some(i) {
            self.unlink(i);
            self.push_back(i);
        }
    }

    fn pop_front(&mut self) -> Option<Node<V>> {
        let i = self.head?;
        Some(self.remove(i))
    }

    fn remove(&mut self, i: usize) -> Node<V> {
        self.unlink(i);
        let node = self.nodes.remove(i);
        self.index.remove(&node.key);
        node
    }

    fn push_back(&mut self, i: usize) {
        let node = &mut self.nodes[i];
        node.prev = self.tail;
        node.next = None;
        match self.tail {
            Some(t) => self.nodes[t].next = Some(i),
            None => self.head = Some(i),
        }
        self.tail = Some(i);
    }

    fn unlink(&mut self, i: usize) {
        let (prev, next) = (self.nodes[i].prev, self.nodes[i].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
    }

    fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(i) = cursor {
            keys.push(self.nodes[i].key.clone());
            cursor = self.nodes[i].next;
        }
        keys
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }
}
