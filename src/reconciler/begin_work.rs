//! Begin phase - compute a fiber's new children on the way down.

use std::rc::Rc;

use super::child_fiber::reconcile_child_fibers;
use super::fiber::{FiberArena, FiberId, FiberKind, FiberProps, FiberQueue, MemoizedState};
use super::flags::Flags;
use super::hooks::Hooks;
use super::work_loop::RootInner;
use crate::element::{Child, ComponentType, Props};
use crate::error::RenderResult;
use crate::host::HostConfig;
use crate::lanes::{remove_lanes, Lane};
use crate::update_queue::ProcessedQueue;

/// Returns the first child to descend into, or `None` when the fiber is a
/// leaf and should complete.
pub(crate) fn begin_work<H: HostConfig>(
    root: &RootInner<H>,
    wip: FiberId,
    render_lane: Lane,
) -> RenderResult<Option<FiberId>> {
    let kind = {
        let mut fibers = root.fibers.borrow_mut();
        let fiber = &mut fibers[wip];
        fiber.lanes = remove_lanes(fiber.lanes, render_lane);
        fiber.kind.clone()
    };

    match kind {
        FiberKind::HostRoot => Ok(update_host_root(root, wip, render_lane)),
        FiberKind::HostComponent(_) => Ok(update_host_component(root, wip)),
        FiberKind::HostText => Ok(None),
        FiberKind::FunctionComponent(component) => {
            update_function_component(root, wip, &component, render_lane)
        }
        FiberKind::Fragment => Ok(update_fragment(root, wip)),
    }
}

/// Diff `children` against the committed children of `wip`.
pub(crate) fn reconcile_children<I: Clone>(
    fibers: &mut FiberArena<I>,
    wip: FiberId,
    children: &Child,
) -> Option<FiberId> {
    let current_child = fibers[wip].alternate.map(|current| fibers[current].child);
    let child = match current_child {
        Some(first) => reconcile_child_fibers(fibers, wip, first, children, true),
        None => reconcile_child_fibers(fibers, wip, None, children, false),
    };
    fibers[wip].child = child;
    child
}

fn update_host_root<H: HostConfig>(
    root: &RootInner<H>,
    wip: FiberId,
    render_lane: Lane,
) -> Option<FiberId> {
    let mut fibers = root.fibers.borrow_mut();
    let fiber = &fibers[wip];

    let FiberQueue::Root(queue) = &fiber.update_queue else {
        log::warn!("host root {wip:?} has no element queue");
        return None;
    };
    let queue = queue.clone();
    let base = match &fiber.memoized_state {
        MemoizedState::Root(base) => base.clone(),
        _ => Child::Empty,
    };

    let processed = queue.process(base, render_lane);
    if processed.seen > 0 {
        root.processed.borrow_mut().push(ProcessedQueue {
            queue,
            seen: processed.seen,
        });
    }

    fibers[wip].memoized_state = MemoizedState::Root(processed.base);
    reconcile_children(&mut *fibers, wip, &processed.state)
}

fn update_host_component<H: HostConfig>(root: &RootInner<H>, wip: FiberId) -> Option<FiberId> {
    let mut fibers = root.fibers.borrow_mut();
    let props = fibers[wip].pending_props.as_element().cloned().unwrap_or_default();
    reconcile_children(&mut *fibers, wip, props.children())
}

fn update_fragment<H: HostConfig>(root: &RootInner<H>, wip: FiberId) -> Option<FiberId> {
    let mut fibers = root.fibers.borrow_mut();
    let children = match &fibers[wip].pending_props {
        FiberProps::Children(children) => children.clone(),
        _ => Child::Empty,
    };
    reconcile_children(&mut *fibers, wip, &children)
}

fn update_function_component<H: HostConfig>(
    root: &RootInner<H>,
    wip: FiberId,
    component: &ComponentType,
    render_lane: Lane,
) -> RenderResult<Option<FiberId>> {
    let (props, previous): (Rc<Props>, _) = {
        let fibers = root.fibers.borrow();
        let fiber = &fibers[wip];
        let previous = fiber
            .alternate
            .map(|current| match &fibers[current].memoized_state {
                MemoizedState::Hooks(hooks) => hooks.clone(),
                _ => Vec::new(),
            });
        (fiber.pending_props.as_element().cloned().unwrap_or_default(), previous)
    };

    // The component may dispatch updates, so nothing is borrowed while it runs.
    let mut hooks = Hooks::new(wip, root.schedule_handle(), render_lane, previous);
    let children = component.render(&mut hooks, &props)?;
    let rendered = hooks.finish()?;

    root.processed.borrow_mut().extend(rendered.processed);

    let mut fibers = root.fibers.borrow_mut();
    let fiber = &mut fibers[wip];
    fiber.memoized_state = MemoizedState::Hooks(rendered.hooks);
    fiber.update_queue = if rendered.effects.is_empty() {
        FiberQueue::None
    } else {
        FiberQueue::Effects(rendered.effects)
    };
    if rendered.has_passive_effect {
        fiber.flags |= Flags::PASSIVE_EFFECT;
    }

    Ok(reconcile_children(&mut *fibers, wip, &children))
}
