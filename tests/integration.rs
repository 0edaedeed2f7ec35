use core_substrate::config::ManagerParams;
use core_substrate::deque::WSDeque;
use core_substrate::job::JobInfo;
use core_substrate::manager::Manager;
use core_substrate::queue::JobQueue;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

/// Owner pushes and pops concurrently with several thieves stealing;
/// every element must be handed out exactly once, with no duplicates
/// and no drops, matching the Chase-Lev deque's core correctness claim.
#[test]
fn deque_owner_and_thieves_race_without_duplication_or_loss() {
    const ELEMENTS: u32 = 50_000;
    const THIEVES: usize = 6;

    let dq = Arc::new(WSDeque::<u32>::new(4096));
    let owner_done = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(THIEVES + 1));

    let mut thieves = Vec::new();
    for _ in 0..THIEVES {
        let dq = Arc::clone(&dq);
        let owner_done = Arc::clone(&owner_done);
        let start = Arc::clone(&start);
        thieves.push(thread::spawn(move || {
            start.wait();
            let mut stolen = Vec::new();
            loop {
                match dq.steal() {
                    Some(v) => stolen.push(v),
                    None => {
                        if owner_done.load(Ordering::Acquire) == 1 && dq.is_empty_approx() {
                            break;
                        }
                    }
                }
            }
            stolen
        }));
    }

    start.wait();
    let mut owned = Vec::new();
    for i in 0..ELEMENTS {
        if dq.push(i) {
            // Occasionally pop our own just-pushed element back (LIFO),
            // exercising the owner-vs-thief race on the same slots.
            if i % 7 == 0 {
                if let Some(v) = dq.pop() {
                    owned.push(v);
                }
            }
        }
    }
    while let Some(v) = dq.pop() {
        owned.push(v);
    }
    owner_done.store(1, Ordering::Release);

    let mut all = owned;
    for t in thieves {
        all.extend(t.join().unwrap());
    }

    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len() as u32, ELEMENTS);
}

/// A batch of independent jobs submitted through a `Manager` all run
/// exactly once.
#[test]
fn manager_runs_a_batch_of_jobs_exactly_once() {
    let manager = Manager::new(ManagerParams {
        worker_count: 4,
        ..ManagerParams::default()
    });

    let mut queue = JobQueue::default();
    let counters: Vec<_> = (0..500).map(|_| Arc::new(AtomicU32::new(0))).collect();

    for c in &counters {
        let c = Arc::clone(c);
        queue += JobInfo::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
    }

    queue.execute(&manager);

    for c in &counters {
        assert_eq!(c.load(Ordering::SeqCst), 1);
    }
}

/// A fork/join pattern: an outer queue's jobs each spawn and drain their
/// own nested `JobQueue` against the same `Manager`, exercising recursive
/// scheduling and cooperative waiting.
#[test]
fn fork_join_nested_job_queues_complete() {
    let manager = Arc::new(Manager::new(ManagerParams {
        worker_count: 4,
        ..ManagerParams::default()
    }));

    let total = Arc::new(AtomicU32::new(0));
    let mut outer = JobQueue::default();

    for _ in 0..8 {
        let total = Arc::clone(&total);
        let manager = Arc::clone(&manager);
        outer += JobInfo::new(move || {
            let mut inner = JobQueue::default();
            for _ in 0..16 {
                let total = Arc::clone(&total);
                inner += JobInfo::new(move || {
                    total.fetch_add(1, Ordering::SeqCst);
                });
            }
            inner.execute(&manager);
        });
    }

    outer.execute(&manager);
    assert_eq!(total.load(Ordering::SeqCst), 8 * 16);
}

/// Dropping a `Manager` with outstanding capacity but no pending jobs
/// joins every worker thread cleanly and promptly.
#[test]
fn manager_shuts_down_cleanly_with_no_pending_work() {
    let manager = Manager::new(ManagerParams {
        worker_count: 6,
        ..ManagerParams::default()
    });
    drop(manager);
}

/// A `Manager` dropped while jobs are still queued still joins: the
/// caller is expected to wait on every queue's counter before dropping,
/// but jobs already placed on worker deques still run to completion
/// first since `Drop` only stops workers once their deques are empty.
#[test]
fn manager_drains_pending_jobs_before_shutdown_completes() {
    let manager = Manager::new(ManagerParams {
        worker_count: 4,
        ..ManagerParams::default()
    });

    let mut queue = JobQueue::default();
    let completed = Arc::new(AtomicU32::new(0));
    for _ in 0..1000 {
        let completed = Arc::clone(&completed);
        queue += JobInfo::new(move || {
            completed.fetch_add(1, Ordering::SeqCst);
        });
    }

    queue.execute(&manager);
    drop(manager);

    assert_eq!(completed.load(Ordering::SeqCst), 1000);
}
