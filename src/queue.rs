//! Ordered batches of jobs sharing one completion counter.
//!
//! A `JobQueue` holds a `(JobPriority, JobInfo)` list plus a `Counter` it
//! owns; `step` schedules and waits for exactly the next queued job
//! (letting a caller interleave other work between steps), and `execute`
//! drains the whole queue. Mirrors the source's `JobQueue::step`/
//! `execute` pair.

use crate::counter::Counter;
use crate::job::{JobInfo, JobPriority};
use crate::manager::Manager;
use std::ops::AddAssign;

pub struct JobQueue {
    default_priority: JobPriority,
    queue: Vec<(JobPriority, JobInfo)>,
    counter: Counter,
}

impl JobQueue {
    pub fn new(default_priority: JobPriority) -> Self {
        Self {
            default_priority,
            queue: Vec::new(),
            counter: Counter::new(),
        }
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(JobPriority::default())
    }
}

impl JobQueue {
    /// Queue `job` at `priority`, binding this queue's counter to it. The
    /// counter is incremented at submission time by `Manager::schedule_job`,
    /// not here -- `add` only binds and appends.
    pub fn add(&mut self, priority: JobPriority, mut job: JobInfo) {
        job.set_counter(&self.counter);
        self.queue.push((priority, job));
    }

    /// Run the next queued job (in FIFO submission order) against
    /// `manager` and block until it completes. Returns `false` if the
    /// queue was already empty.
    pub fn step(&mut self, manager: &Manager) -> bool {
        if self.queue.is_empty() {
            return false;
        }

        let (_, job) = self.queue.remove(0);
        manager.schedule_job(job);
        manager.wait_for_counter(&self.counter);
        true
    }

    /// Run every queued job to completion.
    pub fn execute(&mut self, manager: &Manager) {
        while self.step(manager) {}
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Queue a job at this queue's default priority.
impl AddAssign<JobInfo> for JobQueue {
    fn add_assign(&mut self, job: JobInfo) {
        let priority = self.default_priority;
        self.add(priority, job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerParams;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn execute_runs_every_queued_job_in_order() {
        let manager = Manager::new(ManagerParams {
            worker_count: 3,
            ..ManagerParams::default()
        });
        let mut queue = JobQueue::new(JobPriority::NORMAL);

        static ORDER: AtomicU32 = AtomicU32::new(0);
        let counters: Vec<_> = (0..10).map(|_| std::sync::Arc::new(AtomicU32::new(0))).collect();

        for c in &counters {
            let c = std::sync::Arc::clone(c);
            queue += JobInfo::new(move || {
                let seq = ORDER.fetch_add(1, Ordering::SeqCst);
                c.store(seq + 1, Ordering::SeqCst);
            });
        }

        queue.execute(&manager);

        assert!(queue.is_empty());
        for (i, c) in counters.iter().enumerate() {
            assert_eq!(c.load(Ordering::SeqCst), (i + 1) as u32);
        }
    }

    #[test]
    fn step_returns_false_once_drained() {
        let manager = Manager::new(ManagerParams {
            worker_count: 2,
            ..ManagerParams::default()
        });
        let mut queue = JobQueue::new(JobPriority::NORMAL);
        queue += JobInfo::new(|| {});
        assert!(queue.step(&manager));
        assert!(!queue.step(&manager));
    }
}
