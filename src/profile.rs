//! Optional timing of formula calculations.
//!
//! Disabled unless the `FORMULARY_PROFILE` environment variable is set to
//! something other than `0` or [`set_enabled`] turns it on. When disabled,
//! marks and measurements cost a single atomic load.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// The environment variable that enables profiling at startup.
pub const ENV_VAR: &str = "FORMULARY_PROFILE";

static ENABLED: LazyLock<AtomicBool> = LazyLock::new(|| {
    let enabled = std::env::var(ENV_VAR).is_ok_and(|v| !v.is_empty() && v != "0");
    AtomicBool::new(enabled)
});

/// Whether marks and measurements are recorded.
pub fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Turn profiling on or off.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

/// A named point in time. Empty when profiling is disabled.
#[derive(Debug, Copy, Clone)]
pub struct Mark {
    name: &'static str,
    at: Option<Instant>,
}

/// Mark a named point in time.
pub fn mark(name: &'static str) -> Mark {
    Mark { name, at: enabled().then(Instant::now) }
}

/// Report the time between two marks under `label`.
pub fn measure(label: &str, start: Mark, end: Mark) {
    let (Some(from), Some(to)) = (start.at, end.at) else { return };
    let elapsed = to.saturating_duration_since(from);
    tracing::debug!(
        label,
        start = start.name,
        end = end.name,
        elapsed_us = elapsed.as_micros() as u64,
        "measure"
    );
}
