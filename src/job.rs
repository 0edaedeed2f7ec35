//! Type-erased, small-buffer-optimized job closures.
//!
//! `JobInfo` stores any `FnOnce() + Send` closure inline, with no heap
//! allocation, as long as it fits in `JOB_INLINE_CAPACITY` bytes - the
//! same role the C original's buffer-plus-vtable job slot plays, sized
//! so a `WSDeque<JobInfo>` can move jobs by value. A small per-closure
//! vtable (a `call` function pointer and a `drop` function pointer,
//! monomorphized once per captured closure type) knows how to invoke or
//! tear down whatever is sitting in the inline bytes without the caller
//! needing to know the concrete closure type.

use crate::config::JOB_INLINE_CAPACITY;
use crate::counter::Counter;
use std::panic::{self, AssertUnwindSafe};
use std::process::abort;

#[repr(align(8))]
struct Payload([u8; JOB_INLINE_CAPACITY]);

struct VTable {
    call: unsafe fn(*mut u8),
    drop: unsafe fn(*mut u8),
}

unsafe fn call_impl<F: FnOnce() + Send + 'static>(payload: *mut u8) {
    let f = unsafe { payload.cast::<F>().read() };
    f();
}

unsafe fn drop_impl<F: FnOnce() + Send + 'static>(payload: *mut u8) {
    unsafe { std::ptr::drop_in_place(payload.cast::<F>()) };
}

fn vtable_for<F: FnOnce() + Send + 'static>() -> &'static VTable {
    struct VTableHolder<F>(std::marker::PhantomData<F>);
    impl<F: FnOnce() + Send + 'static> VTableHolder<F> {
        const VTABLE: VTable = VTable {
            call: call_impl::<F>,
            drop: drop_impl::<F>,
        };
    }
    &VTableHolder::<F>::VTABLE
}

/// A job priority, used only to order a `JobQueue`'s pending work;
/// `Manager` itself schedules without regard to priority once a job is
/// submitted (see `SPEC_FULL.md`'s resolution of the priority ordering
/// open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct JobPriority(pub i32);

impl JobPriority {
    pub const NORMAL: JobPriority = JobPriority(0);
}

impl Default for JobPriority {
    fn default() -> Self {
        JobPriority::NORMAL
    }
}

/// A type-erased, inline-stored, one-shot closure plus the `Counter` it
/// decrements on completion.
///
/// `vtable` is `None` exactly when the job is empty (either never
/// filled, or already executed/reset), mirroring the original's
/// null-buffer-pointer check in `isNull()`.
pub struct JobInfo {
    payload: Payload,
    vtable: Option<&'static VTable>,
    counter: Option<*const Counter>,
}

// SAFETY: a `JobInfo` is only ever constructed from an `F: Send`, and the
// raw `Counter` pointer is always borrowed from a `Counter` that outlives
// every job scheduled against it (owned by the `JobQueue` or caller that
// built this `JobInfo`).
unsafe impl Send for JobInfo {}

impl JobInfo {
    /// Wrap `f` for later one-shot execution. Panics if `F` does not fit
    /// in the inline payload - callers with larger captures should box
    /// their state and capture the box's pointer instead.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        assert!(
            std::mem::size_of::<F>() <= JOB_INLINE_CAPACITY,
            "JobInfo::new: closure of {} bytes exceeds inline capacity of {} bytes",
            std::mem::size_of::<F>(),
            JOB_INLINE_CAPACITY
        );
        assert!(std::mem::align_of::<F>() <= std::mem::align_of::<Payload>());

        let mut payload = Payload([0u8; JOB_INLINE_CAPACITY]);
        unsafe {
            payload.0.as_mut_ptr().cast::<F>().write(f);
        }

        Self {
            payload,
            vtable: Some(vtable_for::<F>()),
            counter: None,
        }
    }

    /// An empty job: `execute` is a no-op besides decrementing the
    /// counter, matching the original's `isNull()` short circuit.
    pub fn null() -> Self {
        Self {
            payload: Payload([0u8; JOB_INLINE_CAPACITY]),
            vtable: None,
            counter: None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.vtable.is_none()
    }

    /// Associate the counter this job decrements on completion. Called
    /// by `JobQueue::add` before the job is handed to a `Manager`.
    pub fn set_counter(&mut self, counter: &Counter) {
        self.counter = Some(counter as *const Counter);
    }

    /// Borrow the counter this job is bound to, if any. `Manager::schedule_job`
    /// increments it at submission time, matching the original's placement
    /// of the increment in `scheduleJob` rather than in `add`.
    pub(crate) fn bound_counter(&self) -> Option<&Counter> {
        self.counter.map(|c| unsafe { &*c })
    }

    /// Run the wrapped closure (if any), then decrement the associated
    /// counter (if any). A panicking job aborts the process rather than
    /// unwinding across the worker loop, since an unwound counter
    /// decrement would leave other threads waiting on it forever.
    ///
    /// Idempotent: a second call on an already-executed `JobInfo` only
    /// decrements the counter if `set_counter` was called again meanwhile
    /// - the closure itself runs at most once, since `vtable` is taken on
    /// the first call.
    pub fn execute(&mut self) {
        if let Some(vtable) = self.vtable.take() {
            let payload = self.payload.0.as_mut_ptr();
            let result = panic::catch_unwind(AssertUnwindSafe(|| unsafe { (vtable.call)(payload) }));
            if result.is_err() {
                log::error!("job panicked; aborting process to avoid a stuck counter");
                abort();
            }
        }

        if let Some(counter) = self.counter.take() {
            unsafe { &*counter }.decrement();
        }
    }

    /// Clear this job back to null, running the captured closure's
    /// destructor in place if it was never executed. Idempotent.
    pub fn reset(&mut self) {
        if let Some(vtable) = self.vtable.take() {
            unsafe { (vtable.drop)(self.payload.0.as_mut_ptr()) };
        }
        self.counter = None;
    }
}

impl Drop for JobInfo {
    fn drop(&mut self) {
        if let Some(vtable) = self.vtable.take() {
            unsafe { (vtable.drop)(self.payload.0.as_mut_ptr()) };
        }
    }
}

impl Default for JobInfo {
    fn default() -> Self {
        Self::null()
    }
}
