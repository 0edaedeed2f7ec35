//! Tunable defaults for the runtime substrate.
//!
//! Every constant here has a single call site that reads it as a default;
//! callers override any of them by passing an explicit value to the
//! corresponding constructor (`Arena::new`, `Manager::new`, ...).

use bitflags::bitflags;

/// Default size of a fresh `Arena`'s reserved virtual region.
pub const DEFAULT_ARENA_SIZE: usize = 4 * 1024 * 1024;

/// Default size of the prefix committed eagerly when an `Arena` is created.
pub const DEFAULT_COMMITTED_SIZE: usize = 32 * 1024;

/// Number of scratch arenas each `ThreadContext` owns.
pub const SCRATCH_ARENA_COUNT: usize = 2;

/// Default per-worker `WSDeque` capacity. Must stay a power of two.
pub const DEFAULT_DEQUE_CAPACITY: usize = 1024;

/// Inline storage budget for a `JobInfo`'s captured closure, in bytes.
pub const JOB_INLINE_CAPACITY: usize = 48;

/// How many victim workers a worker tries before giving up on a steal pass.
pub const STEAL_ATTEMPTS_PER_PASS: usize = 8;

/// How long an idle worker waits on its condition variable before
/// re-checking the stopping flag and local queues, even without a notify.
pub const WORKER_PARK_TIMEOUT_MS: u64 = 10;

bitflags! {
    /// Behavior flags for `Arena::new`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArenaFlags: u32 {
        /// Allocate a new chained `Arena` when a push overflows the
        /// current one instead of failing.
        const DO_CHAIN = 1 << 0;
    }
}

impl Default for ArenaFlags {
    fn default() -> Self {
        ArenaFlags::DO_CHAIN
    }
}

/// Parameters accepted by `Arena::new`.
#[derive(Debug, Clone, Copy)]
pub struct ArenaParams {
    pub size: usize,
    pub committed_size: usize,
    pub flags: ArenaFlags,
}

impl Default for ArenaParams {
    fn default() -> Self {
        Self {
            size: DEFAULT_ARENA_SIZE,
            committed_size: DEFAULT_COMMITTED_SIZE,
            flags: ArenaFlags::default(),
        }
    }
}

/// Parameters accepted by `Manager::new`.
#[derive(Debug, Clone, Copy)]
pub struct ManagerParams {
    pub worker_count: usize,
    pub deque_capacity: usize,
}

impl Default for ManagerParams {
    fn default() -> Self {
        Self {
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            deque_capacity: DEFAULT_DEQUE_CAPACITY,
        }
    }
}
