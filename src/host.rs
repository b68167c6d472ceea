//! Host capability interface.
//!
//! The reconciler never touches a host tree directly. Everything it needs
//! (creating nodes, attaching them, applying prop and text changes, deferring
//! work to a microtask) goes through [`HostConfig`]. Host handles are opaque
//! clonable values; a container is just another instance.

use std::fmt;

use crate::element::{diff_props, PropChange, Props};

/// Deferred callback run by the host at its next microtask boundary.
pub type Microtask = Box<dyn FnOnce()>;

/// Host-tree mutation primitives consumed by the reconciler.
pub trait HostConfig: 'static {
    /// Handle to a host node. Containers are instances too.
    type Instance: Clone + fmt::Debug + 'static;

    fn create_instance(&self, ty: &str, props: &Props) -> Self::Instance;

    fn create_text_instance(&self, content: &str) -> Self::Instance;

    /// Attach a child to a parent that is not yet part of the visible tree.
    fn append_initial_child(&self, parent: &Self::Instance, child: &Self::Instance);

    /// Append a child as the last child of a live parent.
    fn append_child_to_container(&self, container: &Self::Instance, child: &Self::Instance);

    /// Insert (or move) a child before an existing child of a live parent.
    fn insert_child_to_container(
        &self,
        container: &Self::Instance,
        child: &Self::Instance,
        before: &Self::Instance,
    );

    fn remove_child(&self, child: &Self::Instance, container: &Self::Instance);

    /// Compute the update payload for a host element, or `None` if nothing
    /// changed.
    fn prepare_update(&self, ty: &str, old: &Props, new: &Props) -> Option<Vec<PropChange>> {
        let _ = ty;
        let changes = diff_props(old, new);
        (!changes.is_empty()).then_some(changes)
    }

    /// Apply a payload from [`HostConfig::prepare_update`].
    fn commit_update(
        &self,
        instance: &Self::Instance,
        ty: &str,
        payload: &[PropChange],
        new_props: &Props,
    );

    fn commit_text_update(&self, instance: &Self::Instance, old: &str, new: &str);

    /// Run `task` after the current synchronous work, before returning to
    /// the host event loop.
    fn schedule_microtask(&self, task: Microtask);
}
