//! Complete phase - build host nodes and bubble flags on the way up.
//!
//! Children complete before their parent, so a freshly created host node
//! can take all of its already-built host descendants at once. Updated host
//! nodes only get a payload; nothing touches the live host tree here.

use std::rc::Rc;

use super::fiber::{FiberArena, FiberId, FiberKind, FiberQueue};
use super::flags::Flags;
use super::work_loop::RootInner;
use crate::host::HostConfig;

pub(crate) fn complete_work<H: HostConfig>(root: &RootInner<H>, wip: FiberId) {
    let host = &root.host;
    let mut fibers = root.fibers.borrow_mut();
    let fibers = &mut *fibers;

    let current = fibers[wip].alternate;
    let has_instance = fibers[wip].state_node.is_some();

    match fibers[wip].kind.clone() {
        FiberKind::HostComponent(tag) => {
            let props = fibers[wip].pending_props.as_element().cloned().unwrap_or_default();
            match current {
                Some(current) if has_instance => {
                    let old = fibers[current].memoized_props.as_element().cloned().unwrap_or_default();
                    if let Some(payload) = host.prepare_update(&tag, &old, &props) {
                        let fiber = &mut fibers[wip];
                        fiber.update_queue = FiberQueue::HostUpdate(payload);
                        fiber.flags |= Flags::UPDATE;
                    }
                }
                _ => {
                    let instance = host.create_instance(&tag, &props);
                    append_all_children(fibers, host, &instance, wip);
                    fibers[wip].state_node = Some(instance);
                }
            }
        }
        FiberKind::HostText => {
            let content = fibers[wip]
                .pending_props
                .as_text()
                .cloned()
                .unwrap_or_else(|| Rc::from(""));
            match current {
                Some(current) if has_instance => {
                    let old = fibers[current].memoized_props.as_text();
                    if old != Some(&content) {
                        fibers[wip].flags |= Flags::UPDATE;
                    }
                }
                _ => {
                    let instance = host.create_text_instance(&content);
                    fibers[wip].state_node = Some(instance);
                }
            }
        }
        FiberKind::HostRoot | FiberKind::FunctionComponent(_) | FiberKind::Fragment => {}
    }

    bubble_properties(fibers, wip);
}

/// Attach the top-level host nodes below `wip` to `parent`.
fn append_all_children<H: HostConfig>(
    fibers: &FiberArena<H::Instance>,
    host: &H,
    parent: &H::Instance,
    wip: FiberId,
) {
    let mut next = fibers[wip].child;

    while let Some(node) = next {
        let fiber = &fibers[node];
        if fiber.kind.is_host() {
            if let Some(child) = &fiber.state_node {
                host.append_initial_child(parent, child);
            }
        } else if let Some(child) = fiber.child {
            next = Some(child);
            continue;
        }

        let mut cursor = node;
        loop {
            if let Some(sibling) = fibers[cursor].sibling {
                next = Some(sibling);
                break;
            }
            match fibers[cursor].parent {
                Some(parent) if parent != wip => cursor = parent,
                _ => return,
            }
        }
    }
}

/// Fold children's flags into `subtree_flags` so commit can skip clean
/// subtrees.
fn bubble_properties<I>(fibers: &mut FiberArena<I>, wip: FiberId) {
    let mut subtree_flags = Flags::empty();
    let mut child = fibers[wip].child;

    while let Some(id) = child {
        let fiber = &mut fibers[id];
        subtree_flags |= fiber.subtree_flags | fiber.flags;
        fiber.parent = Some(wip);
        child = fiber.sibling;
    }

    fibers[wip].subtree_flags |= subtree_flags;
}
