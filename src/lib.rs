//! # spark-reconciler
//!
//! Fiber-style tree reconciler for Rust.
//!
//! Applications describe their UI as immutable [`Element`] trees. The
//! reconciler diffs each new tree against the committed one, applies the
//! minimal set of mutations through a [`HostConfig`] and runs component
//! effects afterwards. Work is prioritized with lanes and executed by a
//! cooperative [`Scheduler`] that can pause long renders between fibers.
//!
//! ## Architecture
//!
//! ```text
//! render / set_state ──► update queue ──► lanes ──► scheduler
//!                                                      │
//!                  begin_work ◄── work loop ◄──────────┘
//!                      │              ▲
//!                      ▼              │
//!                 child diffing   complete_work
//!                                      │
//!                                      ▼
//!                   commit (host mutations) ──► passive effects
//! ```
//!
//! ## Modules
//!
//! - [`element`] - Elements, props and children
//! - [`lanes`] - Update priorities as bit sets
//! - [`update_queue`] - Per-fiber pending updates
//! - [`scheduler`] - Cooperative task scheduler with deadlines
//! - [`reconciler`] - Fibers, work loop, commit and hooks
//! - [`host`] - The trait a host tree implements
//! - [`noop`] - In-memory host for tests and demos
//!
//! ## Example
//!
//! ```ignore
//! use spark_reconciler::{create_root, Child, Element, Hooks, Props, RenderResult};
//! use spark_reconciler::noop::{act, NoopHost};
//!
//! fn counter(hooks: &mut Hooks, _props: &Props) -> RenderResult<Child> {
//!     let (count, _set_count) = hooks.use_state(0)?;
//!     Ok(Element::host("span").child(count).into())
//! }
//!
//! let host = NoopHost::new();
//! let root = create_root(host.clone(), host.create_container());
//! root.render(Element::component(counter));
//! act(&root);
//!
//! assert_eq!(host.to_markup(), "<span>0</span>");
//! ```

pub mod element;
pub mod error;
pub mod host;
pub mod lanes;
pub mod noop;
pub mod reconciler;
pub mod scheduler;
pub mod update_queue;

// Re-export commonly used items
pub use element::{text, Child, Component, ComponentType, Element, ElementType, Key, Props, Value};

pub use error::{ReconcileError, RenderResult};

pub use host::{HostConfig, Microtask};

pub use lanes::{with_update_lane, Lane, Lanes};

pub use reconciler::{
    create_root, create_root_with_scheduler, Destroy, Hooks, Root, SetState,
};

pub use scheduler::{
    Clock, ManualClock, Priority, Scheduler, SchedulerConfig, SystemClock, TaskContext, TaskId,
    TaskResult,
};
