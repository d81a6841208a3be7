use std::cell::Cell;

thread_local! {
    /// Whether the last memoized calculation on this thread was a hit.
    static LAST_WAS_HIT: Cell<bool> = const { Cell::new(false) };
}

/// Whether the last memoized calculation on this thread reused a stored
/// result.
pub fn last_was_hit() -> bool {
    LAST_WAS_HIT.with(Cell::get)
}

/// Records the outcome of a memo store lookup.
pub(crate) fn register(hit: bool) {
    LAST_WAS_HIT.with(|cell| cell.set(hit))
}
