//! core-substrate: arenas, a work-stealing deque, and a job scheduler.
//!
//! This crate is the CORE runtime substrate of a larger systems toolkit:
//! a cooperating set of primitives providing
//!
//! - fast region-based memory management with thread-local scratch slots
//!   ([`arena`], [`scratch`]);
//! - a bounded single-producer/multi-consumer work-stealing deque
//!   ([`deque`]);
//! - a job-and-counter scheduling layer built on a worker pool that
//!   consumes those deques ([`counter`], [`job`], [`manager`],
//!   [`queue`]).
//!
//! The three layers are tightly coupled by design: a `Manager`'s
//! per-worker deques hold `JobInfo`s; a `JobInfo`'s lifetime is bounded
//! by the `Counter` its owning `JobQueue` holds; and any job that needs
//! short-lived scratch space reaches for [`scratch::get_scratch`] instead
//! of contending a global allocator.
//!
//! # Example
//!
//! ```
//! use core_substrate::config::ManagerParams;
//! use core_substrate::job::JobInfo;
//! use core_substrate::manager::Manager;
//! use core_substrate::queue::JobQueue;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! let manager = Manager::new(ManagerParams::default());
//! let mut queue = JobQueue::default();
//! let total = Arc::new(AtomicU32::new(0));
//!
//! for _ in 0..100 {
//!     let total = Arc::clone(&total);
//!     queue += JobInfo::new(move || {
//!         total.fetch_add(1, Ordering::Relaxed);
//!     });
//! }
//!
//! queue.execute(&manager);
//! assert_eq!(total.load(Ordering::Relaxed), 100);
//! ```

pub mod arena;
pub mod config;
pub mod counter;
pub mod deque;
pub mod job;
pub mod manager;
pub mod platform;
pub mod queue;
pub mod scratch;

pub use arena::{Arena, Temp};
pub use counter::Counter;
pub use deque::WSDeque;
pub use job::{JobInfo, JobPriority};
pub use manager::Manager;
pub use queue::JobQueue;
pub use scratch::get_scratch;
