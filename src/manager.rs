//! Worker-pool job scheduler.
//!
//! `Manager` owns a fixed pool of worker threads, each with its own
//! `WSDeque<JobInfo>`. Submitting a job pushes it onto the submitting
//! thread's own deque when the caller is a worker (a cheap, uncontended
//! path), or round-robins across deques otherwise. Idle workers try
//! their own deque first, then a bounded number of random steal attempts
//! against other workers, then park on a condition variable; any thread
//! waiting on a `Counter` (see [`crate::counter::Counter::wait_for_zero`])
//! helps drain the same deques instead of blocking outright, the same
//! cooperative pattern `JobQueue::step` relies on to make `waitForCounter`
//! productive rather than idle.

use crate::config::{ManagerParams, STEAL_ATTEMPTS_PER_PASS, WORKER_PARK_TIMEOUT_MS};
use crate::counter::Counter;
use crate::deque::WSDeque;
use crate::job::JobInfo;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

thread_local! {
    static WORKER_INDEX: Cell<Option<usize>> = Cell::new(None);
}

struct Shared {
    deques: Vec<WSDeque<JobInfo>>,
    stopping: AtomicBool,
    park_mutex: Mutex<()>,
    park_condvar: Condvar,
    next_submit: AtomicUsize,
}

impl Shared {
    fn worker_count(&self) -> usize {
        self.deques.len()
    }

    /// Try to make progress on one job: pop from `index`'s own deque if
    /// given, otherwise steal from a randomly chosen deque. Returns
    /// whether a job was found and run.
    fn try_run_one(&self, own_index: Option<usize>) -> bool {
        if let Some(idx) = own_index {
            if let Some(mut job) = self.deques[idx].pop() {
                job.execute();
                return true;
            }
        }

        let attempts = STEAL_ATTEMPTS_PER_PASS.min(self.worker_count().max(1));
        for _ in 0..attempts {
            let victim = fastrand::usize(..self.worker_count());
            if Some(victim) == own_index {
                continue;
            }
            if let Some(mut job) = self.deques[victim].steal() {
                job.execute();
                return true;
            }
        }

        false
    }

    fn all_empty(&self) -> bool {
        self.deques.iter().all(|d| d.is_empty_approx())
    }

    fn park(&self) {
        let guard = self.park_mutex.lock().unwrap();
        let _ = self
            .park_condvar
            .wait_timeout(guard, Duration::from_millis(WORKER_PARK_TIMEOUT_MS))
            .unwrap();
    }

    fn wake_all(&self) {
        let _guard = self.park_mutex.lock().unwrap();
        self.park_condvar.notify_all();
    }
}

fn worker_loop(shared: Arc<Shared>, index: usize) {
    WORKER_INDEX.with(|cell| cell.set(Some(index)));

    loop {
        if shared.try_run_one(Some(index)) {
            continue;
        }

        if shared.stopping.load(Ordering::Acquire) && shared.all_empty() {
            return;
        }

        shared.park();
    }
}

/// A fixed-size pool of worker threads sharing a set of work-stealing
/// deques.
pub struct Manager {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Manager {
    pub fn new(params: ManagerParams) -> Self {
        let worker_count = params.worker_count.max(1);
        let deques = (0..worker_count)
            .map(|_| WSDeque::new(params.deque_capacity))
            .collect();

        let shared = Arc::new(Shared {
            deques,
            stopping: AtomicBool::new(false),
            park_mutex: Mutex::new(()),
            park_condvar: Condvar::new(),
            next_submit: AtomicUsize::new(0),
        });

        let threads = (0..worker_count)
            .map(|i| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("manager-worker-{i}"))
                    .spawn(move || worker_loop(shared, i))
                    .expect("failed to spawn manager worker thread")
            })
            .collect();

        Self {
            shared,
            threads: Mutex::new(threads),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.shared.worker_count()
    }

    /// Schedule a job for execution. If called from one of this
    /// manager's own worker threads, the job lands on that worker's own
    /// deque (uncontended); otherwise it round-robins across workers.
    ///
    /// Increments the job's bound counter (if any) right before pushing,
    /// not before this call -- `JobQueue::add` only binds a counter, it
    /// never increments it. Panics if the target deque is full: a full
    /// worker deque is a capacity misconfiguration, not something this
    /// crate retries or backpressures.
    pub fn schedule_job(&self, job: JobInfo) {
        let round_robin =
            || self.shared.next_submit.fetch_add(1, Ordering::Relaxed) % self.shared.worker_count();

        // `WORKER_INDEX` is only meaningful on a thread spawned by *this*
        // manager; a thread belonging to some other manager's pool that
        // happens to hold a thread-local index out of our range falls
        // back to round-robin too.
        let index = WORKER_INDEX
            .with(|cell| cell.get())
            .filter(|&i| i < self.shared.worker_count())
            .unwrap_or_else(round_robin);

        if let Some(counter) = job.bound_counter() {
            counter.increment();
        }

        if !self.shared.deques[index].push(job) {
            log::error!("manager: worker {index}'s deque is full");
            panic!("manager: worker {index}'s deque is full (capacity is a configuration error, not backpressure)");
        }
        self.shared.wake_all();
    }

    /// Help drain outstanding work by running a single job, from
    /// whichever deque has one. Returns `false` if nothing was available
    /// right now. Safe to call from any thread, worker or not.
    pub fn help_once(&self) -> bool {
        let own_index = WORKER_INDEX.with(|cell| cell.get());
        self.shared.try_run_one(own_index)
    }

    /// Block until `counter` reaches zero, helping drain the pool's
    /// deques while waiting.
    pub fn wait_for_counter(&self, counter: &Counter) {
        counter.wait_for_zero(self);
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.shared.stopping.store(true, Ordering::Release);
        self.shared.wake_all();

        let threads = std::mem::take(&mut *self.threads.lock().unwrap());
        for t in threads {
            let _ = t.join();
        }
    }
}
