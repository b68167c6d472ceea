//! Scheduler - cooperative, priority-ordered task execution.
//!
//! Work is split into tasks with a [`Priority`]. Each priority maps to a
//! timeout; a task's expiration is its scheduling time plus that timeout,
//! and the task with the earliest expiration always runs next. The host
//! drives execution one slot at a time through
//! [`Scheduler::run_host_task`]; inside a slot, tasks run until the frame
//! budget is spent.
//!
//! # Example
//!
//! ```ignore
//! use spark_reconciler::scheduler::{Priority, Scheduler, TaskResult};
//!
//! let scheduler = Scheduler::default();
//! scheduler.schedule_callback(Priority::Normal, |ctx| {
//!     while !ctx.should_yield() {
//!         // one unit of work
//!         break;
//!     }
//!     TaskResult::Complete
//! });
//! scheduler.flush_all();
//! ```

mod clock;
mod config;
mod task_queue;

pub use clock::*;
pub use config::*;
pub use task_queue::*;
