//! Work loop - scheduling, render passes and commit for one root.
//!
//! # Flow
//!
//! ```text
//! update ──► schedule_update_on_fiber ──► ensure_root_is_scheduled
//!                                              │
//!                 SYNC lane ◄──────────────────┴──────────────► other lanes
//!                     │                                              │
//!        sync queue, flushed in a microtask              Scheduler task at the
//!                     │                                  lane's priority
//!                     ▼                                              ▼
//!         perform_sync_work_on_root              perform_concurrent_work_on_root
//!                     └──────────► render_root ──► commit_root ◄─────┘
//! ```
//!
//! A render pass walks the work-in-progress tree depth first: `begin_work`
//! on the way down, `complete_work` on the way up, following child, sibling
//! and parent links without recursion. Concurrent passes check
//! [`TaskContext::should_yield`] between fibers and resume from the same
//! fiber later. A pass for a different lane starts over from the root.
//!
//! A failed pass is dropped as a whole; the committed tree stays as it was.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::begin_work::begin_work;
use super::commit_work::{commit_mutation_effects, run_passive_effects, PendingPassiveEffects};
use super::complete_work::complete_work;
use super::fiber::{Fiber, FiberArena, FiberId, FiberKind, FiberProps, FiberQueue};
use super::flags::{MUTATION_MASK, PASSIVE_MASK};
use super::hooks::ScheduleUpdate;
use super::sync_queue::SyncQueue;
use crate::element::Child;
use crate::error::{ReconcileError, RenderResult};
use crate::host::HostConfig;
use crate::lanes::{
    get_highest_priority_lane, include_some_lanes, lane_to_scheduler_priority, merge_lanes,
    remove_lanes, request_update_lane, Lane, Lanes, NO_LANE, NO_LANES,
};
use crate::scheduler::{Priority, Scheduler, TaskContext, TaskId, TaskResult};
use crate::update_queue::{Action, ProcessedQueue, Update, UpdateQueue};

/// Outcome of a render pass that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RootExitStatus {
    /// The whole tree was processed; it can be committed.
    Completed,
    /// The pass yielded and will resume later.
    Incomplete,
}

/// State of one render target.
pub(crate) struct RootInner<H: HostConfig> {
    weak_self: Weak<RootInner<H>>,
    pub(crate) host: H,
    pub(crate) container: H::Instance,
    pub(crate) scheduler: Rc<Scheduler>,
    pub(crate) fibers: RefCell<FiberArena<H::Instance>>,

    current: Cell<FiberId>,
    finished_work: Cell<Option<FiberId>>,
    finished_lane: Cell<Lane>,
    pending_lanes: Cell<Lanes>,

    callback_node: Cell<Option<TaskId>>,
    callback_priority: Cell<Lane>,

    work_in_progress: Cell<Option<FiberId>>,
    wip_root_render_lane: Cell<Lane>,
    /// Lanes scheduled while a pass was running; they survive its commit.
    render_phase_lanes: Cell<Lanes>,
    /// Queues folded by the running pass, retired when it commits.
    pub(crate) processed: RefCell<Vec<ProcessedQueue>>,

    pending_passive: RefCell<PendingPassiveEffects>,
    root_does_have_passive_effects: Cell<bool>,
    sync_queue: SyncQueue,

    errors: RefCell<Vec<ReconcileError>>,
}

impl<H: HostConfig> RootInner<H> {
    pub(crate) fn new(host: H, container: H::Instance, scheduler: Rc<Scheduler>) -> Rc<Self> {
        let mut fibers = FiberArena::new();
        let mut host_root = Fiber::new(FiberKind::HostRoot, None, FiberProps::Empty);
        host_root.state_node = Some(container.clone());
        host_root.update_queue = FiberQueue::Root(Rc::new(UpdateQueue::new()));
        let current = fibers.insert(host_root);

        Rc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            host,
            container,
            scheduler,
            fibers: RefCell::new(fibers),
            current: Cell::new(current),
            finished_work: Cell::new(None),
            finished_lane: Cell::new(NO_LANE),
            pending_lanes: Cell::new(NO_LANES),
            callback_node: Cell::new(None),
            callback_priority: Cell::new(NO_LANE),
            work_in_progress: Cell::new(None),
            wip_root_render_lane: Cell::new(NO_LANE),
            render_phase_lanes: Cell::new(NO_LANES),
            processed: RefCell::new(Vec::new()),
            pending_passive: RefCell::new(PendingPassiveEffects::default()),
            root_does_have_passive_effects: Cell::new(false),
            sync_queue: SyncQueue::default(),
            errors: RefCell::new(Vec::new()),
        })
    }

    pub(crate) fn schedule_handle(&self) -> Weak<dyn ScheduleUpdate> {
        let handle: Weak<dyn ScheduleUpdate> = self.weak_self.clone();
        handle
    }

    pub(crate) fn pending_lanes(&self) -> Lanes {
        self.pending_lanes.get()
    }

    pub(crate) fn take_errors(&self) -> Vec<ReconcileError> {
        self.errors.take()
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Queue a new element tree for the root.
    pub(crate) fn update_container(&self, element: Child) {
        let current = self.current.get();
        let queue = match &self.fibers.borrow()[current].update_queue {
            FiberQueue::Root(queue) => queue.clone(),
            _ => {
                log::error!("host root {current:?} lost its element queue");
                return;
            }
        };

        let lane = request_update_lane();
        queue.enqueue(Update::new(Action::Replace(element), lane));
        if let Err(error) = self.schedule_update_on_fiber(current, lane) {
            log::error!("failed to schedule root update: {error}");
        }
    }

    /// Walk from `fiber` to the host root, marking lanes on the way.
    fn mark_update_lane_from_fiber_to_root(&self, fiber: FiberId, lane: Lane) -> RenderResult<()> {
        let mut fibers = self.fibers.borrow_mut();
        let mut node = fiber;

        loop {
            let Some(current) = fibers.get_mut(node) else {
                log::warn!("update dispatched to unmounted fiber {fiber:?}");
                return Err(ReconcileError::Unmounted);
            };
            current.lanes = merge_lanes(current.lanes, lane);
            let parent = current.parent;
            let alternate = current.alternate;
            let is_root = matches!(current.kind, FiberKind::HostRoot);

            if let Some(other) = alternate.and_then(|id| fibers.get_mut(id)) {
                other.lanes = merge_lanes(other.lanes, lane);
            }
            if is_root {
                return Ok(());
            }
            match parent {
                Some(parent) => node = parent,
                None => {
                    log::warn!("update dispatched to detached fiber {fiber:?}");
                    return Err(ReconcileError::Unmounted);
                }
            }
        }
    }

    fn mark_root_updated(&self, lane: Lane) {
        self.pending_lanes.set(merge_lanes(self.pending_lanes.get(), lane));
        if self.wip_root_render_lane.get() != NO_LANE {
            self.render_phase_lanes
                .set(merge_lanes(self.render_phase_lanes.get(), lane));
        }
    }

    fn mark_root_finished(&self, lane: Lane) {
        let remaining = remove_lanes(self.pending_lanes.get(), lane);
        self.pending_lanes
            .set(merge_lanes(remaining, self.render_phase_lanes.take()));
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    pub(crate) fn ensure_root_is_scheduled(&self) {
        let update_lane = get_highest_priority_lane(self.pending_lanes.get());
        let existing = self.callback_node.get();

        if update_lane == NO_LANE {
            if let Some(task) = existing {
                self.scheduler.cancel_callback(task);
            }
            self.callback_node.set(None);
            self.callback_priority.set(NO_LANE);
            return;
        }

        if update_lane == self.callback_priority.get() {
            return;
        }

        if let Some(task) = existing {
            log::debug!("cancelling {task:?} for higher priority lane {update_lane:?}");
            self.scheduler.cancel_callback(task);
        }

        let new_node = if update_lane == Lanes::SYNC {
            log::trace!("scheduling sync render");
            let root = self.weak_self.clone();
            self.sync_queue.schedule(Box::new(move || {
                if let Some(root) = root.upgrade() {
                    root.perform_sync_work_on_root();
                }
            }));
            let root = self.weak_self.clone();
            self.host.schedule_microtask(Box::new(move || {
                if let Some(root) = root.upgrade() {
                    root.flush_sync_callbacks();
                }
            }));
            None
        } else {
            let priority = lane_to_scheduler_priority(update_lane);
            log::trace!("scheduling {update_lane:?} render at {priority:?}");
            Some(
                self.scheduler
                    .schedule_callback(priority, Self::concurrent_task(self.weak_self.clone())),
            )
        };

        self.callback_node.set(new_node);
        self.callback_priority.set(update_lane);
    }

    pub(crate) fn flush_sync_callbacks(&self) {
        let queued = self.sync_queue.len();
        if queued > 0 {
            log::trace!("flushing {queued} sync callbacks");
        }
        self.sync_queue.flush();
    }

    fn concurrent_task(root: Weak<Self>) -> impl FnOnce(&TaskContext<'_>) -> TaskResult + 'static {
        move |ctx| match root.upgrade() {
            Some(root) => root.perform_concurrent_work_on_root(ctx),
            None => TaskResult::Complete,
        }
    }

    // =========================================================================
    // Perform
    // =========================================================================

    fn perform_sync_work_on_root(&self) {
        // This callback is being consumed; later sync updates need a new one.
        if self.callback_node.get().is_none() && self.callback_priority.get() == Lanes::SYNC {
            self.callback_priority.set(NO_LANE);
        }

        self.flush_passive_effects();

        let lane = get_highest_priority_lane(self.pending_lanes.get());
        if lane != Lanes::SYNC {
            self.ensure_root_is_scheduled();
            return;
        }

        match self.render_root(lane, None) {
            Ok(RootExitStatus::Completed) => {
                self.finish_render(lane);
                self.commit_root();
            }
            Ok(RootExitStatus::Incomplete) => {
                log::error!("synchronous render returned before completing");
            }
            Err(error) => {
                self.handle_render_error(lane, error);
                self.ensure_root_is_scheduled();
            }
        }
    }

    fn perform_concurrent_work_on_root(&self, ctx: &TaskContext<'_>) -> TaskResult {
        let callback_node = self.callback_node.get();
        let did_flush = self.flush_passive_effects();
        if did_flush && self.callback_node.get() != callback_node {
            // An effect scheduled something more urgent.
            return TaskResult::Complete;
        }

        let lane = get_highest_priority_lane(self.pending_lanes.get());
        if lane == NO_LANE {
            self.ensure_root_is_scheduled();
            return TaskResult::Complete;
        }

        let should_time_slice = lane != Lanes::SYNC && !ctx.did_timeout();
        match self.render_root(lane, should_time_slice.then_some(ctx)) {
            Ok(RootExitStatus::Incomplete) => {
                if self.callback_node.get() != Some(ctx.task_id()) {
                    return TaskResult::Complete;
                }
                return TaskResult::Continue(Box::new(Self::concurrent_task(self.weak_self.clone())));
            }
            Ok(RootExitStatus::Completed) => {
                self.finish_render(lane);
                self.commit_root();
            }
            Err(error) => {
                self.handle_render_error(lane, error);
                self.ensure_root_is_scheduled();
            }
        }

        if self.callback_node.get() == Some(ctx.task_id()) {
            TaskResult::Continue(Box::new(Self::concurrent_task(self.weak_self.clone())))
        } else {
            TaskResult::Complete
        }
    }

    // =========================================================================
    // Render
    // =========================================================================

    fn prepare_fresh_stack(&self, lane: Lane) {
        {
            let mut fibers = self.fibers.borrow_mut();
            if self.wip_root_render_lane.get() != NO_LANE {
                log::debug!(
                    "abandoning {:?} render for {lane:?}",
                    self.wip_root_render_lane.get()
                );
            }
            fibers.discard_fresh();
            self.processed.borrow_mut().clear();
            let wip = fibers.create_work_in_progress(self.current.get(), FiberProps::Empty);
            self.work_in_progress.set(Some(wip));
        }
        self.finished_work.set(None);
        self.wip_root_render_lane.set(lane);
        self.render_phase_lanes.set(NO_LANES);
    }

    /// Run the work loop for `lane`. With a task context the loop yields
    /// when the scheduler asks for it.
    fn render_root(
        &self,
        lane: Lane,
        ctx: Option<&TaskContext<'_>>,
    ) -> RenderResult<RootExitStatus> {
        if self.wip_root_render_lane.get() != lane {
            self.prepare_fresh_stack(lane);
        }
        log::trace!("rendering {lane:?}");

        loop {
            let Some(unit) = self.work_in_progress.get() else {
                return Ok(RootExitStatus::Completed);
            };
            if ctx.is_some_and(TaskContext::should_yield) {
                return Ok(RootExitStatus::Incomplete);
            }
            self.perform_unit_of_work(unit, lane)?;
        }
    }

    fn perform_unit_of_work(&self, unit: FiberId, lane: Lane) -> RenderResult<()> {
        let next = begin_work(self, unit, lane)?;
        {
            let mut fibers = self.fibers.borrow_mut();
            let fiber = &mut fibers[unit];
            fiber.memoized_props = fiber.pending_props.clone();
        }

        match next {
            Some(child) => self.work_in_progress.set(Some(child)),
            None => self.complete_unit_of_work(unit),
        }
        Ok(())
    }

    fn complete_unit_of_work(&self, unit: FiberId) {
        let mut node = unit;
        loop {
            complete_work(self, node);

            let (sibling, parent) = {
                let fibers = self.fibers.borrow();
                (fibers[node].sibling, fibers[node].parent)
            };
            if let Some(sibling) = sibling {
                self.work_in_progress.set(Some(sibling));
                return;
            }
            match parent {
                Some(parent) => node = parent,
                None => {
                    self.work_in_progress.set(None);
                    return;
                }
            }
        }
    }

    fn finish_render(&self, lane: Lane) {
        let finished = self.fibers.borrow()[self.current.get()].alternate;
        self.finished_work.set(finished);
        self.finished_lane.set(lane);
        self.wip_root_render_lane.set(NO_LANE);
    }

    /// Drop a failed pass. The committed tree is untouched; the updates the
    /// pass consumed are retired so the same failure is not retried forever.
    fn handle_render_error(&self, lane: Lane, error: ReconcileError) {
        log::error!("render aborted for {lane:?}: {error}");

        self.fibers.borrow_mut().discard_fresh();
        self.work_in_progress.set(None);
        self.wip_root_render_lane.set(NO_LANE);
        self.finished_work.set(None);

        for processed in self.processed.take() {
            processed.retire(lane);
        }
        self.mark_root_finished(lane);
        self.errors.borrow_mut().push(error);
    }

    // =========================================================================
    // Commit
    // =========================================================================

    fn commit_root(&self) {
        let Some(finished) = self.finished_work.take() else {
            return;
        };
        let lane = self.finished_lane.replace(NO_LANE);
        if lane == NO_LANE {
            log::error!("committing a tree without a lane");
        }
        log::debug!("committing {lane:?}");

        self.mark_root_finished(lane);
        if include_some_lanes(self.pending_lanes.get(), lane) {
            log::debug!("{lane:?} was updated during the render, rendering again");
        }
        for processed in self.processed.take() {
            processed.retire(lane);
        }
        self.fibers.borrow_mut().commit_fresh();

        let flags = {
            let fibers = self.fibers.borrow();
            fibers[finished].flags | fibers[finished].subtree_flags
        };

        if flags.intersects(PASSIVE_MASK) && !self.root_does_have_passive_effects.replace(true) {
            let root = self.weak_self.clone();
            self.scheduler.schedule_callback(Priority::Normal, move |_ctx| {
                if let Some(root) = root.upgrade() {
                    root.flush_passive_effects();
                }
                TaskResult::Complete
            });
        }

        if flags.intersects(MUTATION_MASK | PASSIVE_MASK) {
            let mut fibers = self.fibers.borrow_mut();
            let mut passive = self.pending_passive.borrow_mut();
            commit_mutation_effects(&self.host, &mut fibers, &mut passive, finished);
        } else {
            log::trace!("nothing to commit");
        }

        self.current.set(finished);
        self.ensure_root_is_scheduled();
    }

    /// Run queued passive effects, then any sync work they scheduled.
    /// Returns true if there was anything to run.
    pub(crate) fn flush_passive_effects(&self) -> bool {
        let pending = self.pending_passive.take();
        self.root_does_have_passive_effects.set(false);
        let did_flush = run_passive_effects(pending);
        self.flush_sync_callbacks();
        did_flush
    }
}

impl<H: HostConfig> ScheduleUpdate for RootInner<H> {
    fn schedule_update_on_fiber(&self, fiber: FiberId, lane: Lane) -> RenderResult<()> {
        self.mark_update_lane_from_fiber_to_root(fiber, lane)?;
        self.mark_root_updated(lane);
        self.ensure_root_is_scheduled();
        Ok(())
    }
}
