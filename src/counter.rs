//! Atomic job-completion counter.
//!
//! A `Counter` starts at zero, is incremented once per job scheduled
//! against it, and decremented by each job's `JobInfo::execute` when it
//! finishes. `wait_for_zero` lets a caller block until every job sharing
//! the counter has completed, cooperatively helping the `Manager` drain
//! work while it waits rather than sitting idle.

use crate::manager::Manager;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Counter {
    count: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
        }
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Called once per job scheduled against this counter, before the
    /// job becomes visible to any worker.
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Called exactly once by the job that decrements it (normally
    /// `JobInfo::execute`). Underflowing past zero means a job ran twice
    /// or a counter was shared incorrectly, both programmer errors.
    pub fn decrement(&self) {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "Counter underflow: decremented past zero");
    }

    /// Block the calling thread until this counter reaches zero,
    /// participating in `manager`'s work-stealing loop while waiting so
    /// the wait itself makes progress on outstanding jobs instead of
    /// just occupying a thread.
    pub fn wait_for_zero(&self, manager: &Manager) {
        while self.get() != 0 {
            if !manager.help_once() {
                std::thread::yield_now();
            }
        }
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_decrement_round_trip() {
        let c = Counter::new();
        c.increment();
        c.increment();
        assert_eq!(c.get(), 2);
        c.decrement();
        assert_eq!(c.get(), 1);
        c.decrement();
        assert_eq!(c.get(), 0);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn decrement_below_zero_is_fatal() {
        let c = Counter::new();
        c.decrement();
    }
}
