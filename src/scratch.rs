//! Per-thread scratch arenas.
//!
//! Every thread that touches this crate's scheduler owns a small, fixed
//! pool of scratch `Arena`s (`SCRATCH_ARENA_COUNT`), lazily created on
//! first use and torn down when the thread exits. `get_scratch` hands out
//! a `Temp` over one of the pool's arenas, picking one not present in
//! `excludes` so a caller already holding a scratch arena (e.g. as an
//! input buffer) can request a second, distinct one for its output
//! without aliasing — the same pattern the original `get_scratch(excludes,
//! count)` call serves.

use crate::arena::{Arena, Temp};
use crate::config::{ArenaParams, SCRATCH_ARENA_COUNT};
use std::cell::RefCell;

struct ScratchArenas {
    slots: [Arena; SCRATCH_ARENA_COUNT],
    next_index: usize,
}

impl ScratchArenas {
    fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Arena::new(ArenaParams::default())),
            next_index: 0,
        }
    }
}

/// Per-thread state: this thread's scratch arena pool plus, optionally,
/// the SPMD lane it currently belongs to.
///
/// `spmd_lane` mirrors the source's `ThreadContext::membership`; this
/// crate does not implement SPMD lane groups (see module docs on
/// `manager`), so the field stays `None` for every thread today but keeps
/// the data model in place for a future `spmd` module to populate.
pub struct ThreadContext {
    scratch: RefCell<ScratchArenas>,
    pub spmd_lane: RefCell<Option<u64>>,
}

impl ThreadContext {
    fn new() -> Self {
        Self {
            scratch: RefCell::new(ScratchArenas::new()),
            spmd_lane: RefCell::new(None),
        }
    }
}

thread_local! {
    static THREAD_CONTEXT: ThreadContext = ThreadContext::new();
}

/// Borrow a scratch arena belonging to the calling thread, skipping any
/// arena whose address appears in `excludes`.
///
/// Panics if every slot in the pool is excluded: `SCRATCH_ARENA_COUNT` is
/// sized so a caller never needs more concurrently live scratch arenas
/// than that within one call stack.
pub fn get_scratch(excludes: &[&Arena]) -> Temp<'static> {
    THREAD_CONTEXT.with(|ctx| {
        let scratch = ctx.scratch.borrow();
        let len = scratch.slots.len();

        for offset in 0..len {
            let idx = (scratch_next_index(ctx) + offset) % len;
            let candidate = &scratch.slots[idx];
            let excluded = excludes
                .iter()
                .any(|e| std::ptr::eq(*e, candidate as *const Arena));
            if !excluded {
                advance_next_index(ctx, idx);
                // SAFETY: the arena lives in thread-local storage for the
                // lifetime of the thread; `Temp` never outlives the thread
                // that created it in practice, matching the source's use
                // of scratch arenas as stack-discipline-only temporaries.
                let arena: &'static Arena =
                    unsafe { &*(candidate as *const Arena) };
                return Temp::begin(arena);
            }
        }

        panic!("get_scratch: all scratch arena slots are excluded");
    })
}

fn scratch_next_index(ctx: &ThreadContext) -> usize {
    ctx.scratch.borrow().next_index
}

fn advance_next_index(ctx: &ThreadContext, used: usize) {
    let mut scratch = ctx.scratch.borrow_mut();
    scratch.next_index = (used + 1) % scratch.slots.len();
}

/// Run `f` with a reference to the calling thread's `ThreadContext`.
pub fn with_thread_context<R>(f: impl FnOnce(&ThreadContext) -> R) -> R {
    THREAD_CONTEXT.with(f)
}
