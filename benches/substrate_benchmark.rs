use std::hint::black_box;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use core_substrate::config::{ArenaFlags, ArenaParams, ManagerParams};
use core_substrate::job::JobInfo;
use core_substrate::manager::Manager;
use core_substrate::queue::JobQueue;
use core_substrate::Arena;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

fn arena_push_throughput(c: &mut Criterion) {
    env_logger::init();

    c.bench_function("arena_push_64b", |b| {
        b.iter_batched(
            || {
                Arena::new(ArenaParams {
                    size: 16 * 1024 * 1024,
                    committed_size: 4 * 1024 * 1024,
                    flags: ArenaFlags::DO_CHAIN,
                })
            },
            |arena| {
                for _ in 0..10_000 {
                    black_box(arena.push(64, 8));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn job_batch_dispatch(c: &mut Criterion) {
    let manager = Manager::new(ManagerParams {
        worker_count: 4,
        ..ManagerParams::default()
    });

    c.bench_function("job_batch_1000", |b| {
        b.iter(|| {
            let mut queue = JobQueue::default();
            let total = Arc::new(AtomicU32::new(0));
            for _ in 0..1000 {
                let total = Arc::clone(&total);
                queue += JobInfo::new(move || {
                    total.fetch_add(1, Ordering::Relaxed);
                });
            }
            queue.execute(&manager);
            black_box(total.load(Ordering::Relaxed));
        })
    });
}

criterion_group!(benches, arena_push_throughput, job_batch_dispatch);
criterion_main!(benches);
