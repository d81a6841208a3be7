use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// A deferred unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a job queued with an idle-time scheduler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct IdleHandle(u64);

/// Decides _when_ deferred work, like a memo store cleanup, runs.
pub trait Scheduler: Send + Sync {
    /// Run `job` at the next idle opportunity.
    ///
    /// Returns a handle when the job was deferred and `None` when it already
    /// ran.
    fn schedule(&self, job: Job) -> Option<IdleHandle>;
}

/// Runs every job synchronously. Used when the host has no idle time.
#[derive(Debug, Copy, Clone, Default)]
pub struct Immediate;

impl Scheduler for Immediate {
    fn schedule(&self, job: Job) -> Option<IdleHandle> {
        job();
        None
    }
}

/// Queues jobs until the host reports an idle moment through
/// [`run_idle`](Self::run_idle).
#[derive(Default)]
pub struct IdleQueue {
    jobs: Mutex<VecDeque<(IdleHandle, Job)>>,
    next: AtomicU64,
}

impl IdleQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of jobs waiting for an idle moment.
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every job queued so far and return how many ran.
    ///
    /// Jobs scheduled while this runs wait for the next idle moment.
    pub fn run_idle(&self) -> usize {
        // Take the jobs out first so that they may schedule again.
        let jobs = std::mem::take(&mut *self.jobs.lock());
        let count = jobs.len();
        for (handle, job) in jobs {
            tracing::trace!(?handle, "running idle job");
            job();
        }
        count
    }
}

impl Scheduler for IdleQueue {
    fn schedule(&self, job: Job) -> Option<IdleHandle> {
        let handle = IdleHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.jobs.lock().push_back((handle, job));
        Some(handle)
    }
}
