//! Reconciler - fibers, the render/commit work loop and hooks.
//!
//! ## Modules
//!
//! - `fiber` - work nodes and the two-generation arena
//! - `child_fiber` - child diffing
//! - `begin_work` / `complete_work` - the two halves of a render pass
//! - `commit_work` - host mutations and passive effects
//! - `hooks` - `use_state` / `use_effect`
//! - `sync_queue` - same-tick batching of synchronous renders
//! - `work_loop` - scheduling and the render/commit driver
//! - `root` - public root API

mod begin_work;
mod child_fiber;
mod commit_work;
mod complete_work;
mod fiber;
mod flags;
mod hooks;
mod root;
mod sync_queue;
mod work_loop;

pub use fiber::{FiberId, WorkTag};
pub use flags::{Flags, HookFlags, MUTATION_MASK, PASSIVE_MASK};
pub use hooks::{Destroy, Hooks, SetState};
pub use root::*;
