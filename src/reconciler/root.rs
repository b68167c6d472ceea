//! Root API - the entry point an application renders into.
//!
//! # Example
//!
//! ```ignore
//! use spark_reconciler::{create_root, Element};
//! use spark_reconciler::noop::{act, NoopHost};
//!
//! let host = NoopHost::new();
//! let container = host.create_container();
//! let root = create_root(host.clone(), container);
//!
//! root.render(Element::host("div").child("hello"));
//! act(&root);
//!
//! assert_eq!(host.to_markup(), "<div>hello</div>");
//! ```

use std::fmt;
use std::rc::Rc;

use super::work_loop::RootInner;
use crate::element::Child;
use crate::error::ReconcileError;
use crate::host::HostConfig;
use crate::lanes::Lanes;
use crate::scheduler::Scheduler;

/// A render target: one container and the tree rendered into it.
pub struct Root<H: HostConfig> {
    inner: Rc<RootInner<H>>,
}

/// Create a root with its own scheduler on the system clock.
pub fn create_root<H: HostConfig>(host: H, container: H::Instance) -> Root<H> {
    create_root_with_scheduler(host, container, Rc::new(Scheduler::default()))
}

/// Create a root that schedules its work on `scheduler`.
pub fn create_root_with_scheduler<H: HostConfig>(
    host: H,
    container: H::Instance,
    scheduler: Rc<Scheduler>,
) -> Root<H> {
    Root {
        inner: RootInner::new(host, container, scheduler),
    }
}

impl<H: HostConfig> Root<H> {
    /// Schedule rendering `element` into the container.
    ///
    /// The lane comes from [`crate::lanes::with_update_lane`] and defaults to
    /// `SYNC`, which renders at the host's next microtask.
    pub fn render(&self, element: impl Into<Child>) {
        self.inner.update_container(element.into());
    }

    /// Schedule removing everything from the container.
    pub fn unmount(&self) {
        self.inner.update_container(Child::Empty);
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    pub fn container(&self) -> &H::Instance {
        &self.inner.container
    }

    pub fn scheduler(&self) -> &Rc<Scheduler> {
        &self.inner.scheduler
    }

    /// Lanes with work that has not been committed yet.
    pub fn pending_lanes(&self) -> Lanes {
        self.inner.pending_lanes()
    }

    /// Run queued synchronous renders now instead of waiting for the
    /// microtask.
    pub fn flush_sync(&self) {
        self.inner.flush_sync_callbacks();
    }

    /// Run pending passive effects now. Returns true if any were queued.
    pub fn flush_passive_effects(&self) -> bool {
        self.inner.flush_passive_effects()
    }

    /// Errors of render passes that were abandoned since the last call.
    pub fn take_errors(&self) -> Vec<ReconcileError> {
        self.inner.take_errors()
    }
}

impl<H: HostConfig> fmt::Debug for Root<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("container", &self.inner.container)
            .field("pending_lanes", &self.inner.pending_lanes())
            .field("fibers", &self.inner.fibers.borrow().len())
            .finish_non_exhaustive()
    }
}
