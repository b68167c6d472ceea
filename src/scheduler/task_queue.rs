//! Cooperative task queue.
//!
//! # Selection
//!
//! Pending tasks form an unordered set. The next task is always the one with
//! the earliest expiration time (`scheduled_at + timeout(priority)`), ties
//! broken by scheduling order. Low-priority work ages toward the front
//! instead of starving behind a stream of higher-priority work.
//!
//! # Host task
//!
//! The embedding host drives the queue by calling [`Scheduler::run_host_task`]
//! whenever it has a slot (a message-channel tick, a frame, a loop turn).
//! The scheduler keeps track of which task the host trigger was armed for.
//! Scheduling a task that becomes the new front re-arms the trigger (the
//! previous one is cancelled); scheduling anything else leaves the existing
//! trigger alone.
//!
//! # Yielding
//!
//! Long callbacks poll [`TaskContext::should_yield`] and return
//! [`TaskResult::Continue`] with a continuation to resume later. Expired
//! tasks are never asked to yield by the host loop.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::clock::{Clock, SystemClock};
use super::config::{Priority, SchedulerConfig};

/// Scheduled unit of work.
pub type TaskCallback = Box<dyn FnOnce(&TaskContext<'_>) -> TaskResult>;

/// What a callback wants after it returns.
pub enum TaskResult {
    /// Done. The task is removed.
    Complete,
    /// Not done. Run this continuation later, keeping the task's identity,
    /// priority and expiration.
    Continue(TaskCallback),
}

/// Handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Passed to a running callback.
pub struct TaskContext<'a> {
    scheduler: &'a Scheduler,
    id: TaskId,
    did_timeout: bool,
}

impl TaskContext<'_> {
    pub fn task_id(&self) -> TaskId {
        self.id
    }

    /// True when the task ran because it expired. Expired work should
    /// finish without yielding.
    pub fn did_timeout(&self) -> bool {
        self.did_timeout
    }

    pub fn should_yield(&self) -> bool {
        self.scheduler.should_yield()
    }

    pub fn scheduler(&self) -> &Scheduler {
        self.scheduler
    }
}

struct Task {
    id: TaskId,
    priority: Priority,
    expiration: Duration,
    callback: TaskCallback,
}

#[derive(Default)]
struct SchedulerState {
    tasks: Vec<Task>,
    next_id: u64,
    current_task: Option<TaskId>,
    current_priority: Priority,
    cancel_current: bool,
    is_performing_work: bool,
    host_task: Option<TaskId>,
    host_task_requests: usize,
    deadline: Duration,
}

impl SchedulerState {
    fn select(&self) -> Option<usize> {
        self.tasks
            .iter()
            .enumerate()
            .min_by_key(|(_, task)| (task.expiration, task.id))
            .map(|(index, _)| index)
    }
}

/// Priority task queue with earliest-expiration-first selection.
pub struct Scheduler {
    config: SchedulerConfig,
    clock: Rc<dyn Clock>,
    state: RefCell<SchedulerState>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, clock: Rc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: RefCell::new(SchedulerState::default()),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Schedule `callback` at `priority`.
    pub fn schedule_callback(
        &self,
        priority: Priority,
        callback: impl FnOnce(&TaskContext<'_>) -> TaskResult + 'static,
    ) -> TaskId {
        let expiration = self
            .clock
            .now()
            .saturating_add(self.config.timeout(priority));

        let id = {
            let mut state = self.state.borrow_mut();
            let id = TaskId(state.next_id);
            state.next_id += 1;
            state.tasks.push(Task {
                id,
                priority,
                expiration,
                callback: Box::new(callback),
            });
            id
        };

        log::trace!("scheduled task {id:?} at {priority:?}, expires at {expiration:?}");
        self.request_host_task();
        id
    }

    /// Cancel a pending task. Returns true if it was removed.
    ///
    /// A task that is currently running cannot be removed; it is asked to
    /// yield and any continuation it returns is dropped.
    pub fn cancel_callback(&self, id: TaskId) -> bool {
        let removed = {
            let mut state = self.state.borrow_mut();
            if state.current_task == Some(id) {
                state.cancel_current = true;
                return false;
            }
            let Some(index) = state.tasks.iter().position(|task| task.id == id) else {
                return false;
            };
            state.tasks.swap_remove(index);
            if state.host_task == Some(id) {
                state.host_task = None;
            }
            true
        };

        log::trace!("cancelled task {id:?}");
        self.request_host_task();
        removed
    }

    /// Re-run selection and re-arm the host trigger if the front changed.
    fn request_host_task(&self) {
        let mut state = self.state.borrow_mut();
        if state.is_performing_work {
            return;
        }
        let next = state.select().map(|index| state.tasks[index].id);
        if next == state.host_task {
            return;
        }
        if let Some(previous) = state.host_task {
            log::trace!("host task for {previous:?} cancelled");
        }
        state.host_task = next;
        if let Some(id) = next {
            state.host_task_requests += 1;
            log::trace!("host task armed for {id:?}");
        }
    }

    // =========================================================================
    // Running
    // =========================================================================

    /// True when the running host task has used up its frame budget, or the
    /// running task was cancelled.
    pub fn should_yield(&self) -> bool {
        let state = self.state.borrow();
        state.cancel_current || self.clock.now() >= state.deadline
    }

    /// Run tasks for one host slot.
    ///
    /// Returns true if work remains and the host should call again.
    pub fn run_host_task(&self) -> bool {
        {
            let mut state = self.state.borrow_mut();
            if state.host_task.is_none() || state.is_performing_work {
                return state.host_task.is_some();
            }
            state.host_task = None;
            state.is_performing_work = true;
            state.deadline = self.clock.now().saturating_add(self.config.frame_budget);
        }

        loop {
            let now = self.clock.now();
            let task = {
                let mut state = self.state.borrow_mut();
                let Some(index) = state.select() else { break };
                if state.tasks[index].expiration > now && now >= state.deadline {
                    break;
                }
                let task = state.tasks.swap_remove(index);
                state.current_task = Some(task.id);
                state.current_priority = task.priority;
                state.cancel_current = false;
                task
            };

            let Task {
                id,
                priority,
                expiration,
                callback,
            } = task;
            let context = TaskContext {
                scheduler: self,
                id,
                did_timeout: expiration <= now,
            };
            let result = callback(&context);

            let mut state = self.state.borrow_mut();
            let cancelled = std::mem::take(&mut state.cancel_current);
            state.current_task = None;
            state.current_priority = Priority::Normal;
            if let TaskResult::Continue(callback) = result {
                if cancelled {
                    log::trace!("dropping continuation of cancelled task {id:?}");
                } else {
                    state.tasks.push(Task {
                        id,
                        priority,
                        expiration,
                        callback,
                    });
                }
            }
        }

        self.state.borrow_mut().is_performing_work = false;
        self.request_host_task();
        self.state.borrow().host_task.is_some()
    }

    /// Drive host tasks until nothing is pending. Returns true if any task ran.
    pub fn flush_all(&self) -> bool {
        let mut ran = false;
        while self.state.borrow().host_task.is_some() {
            let before = self.pending_count();
            let more = self.run_host_task();
            ran |= before > 0;
            if !more {
                break;
            }
        }
        ran
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Priority of the running task, or `Normal` outside any task.
    pub fn current_priority_level(&self) -> Priority {
        self.state.borrow().current_priority
    }

    /// Run `f` as if inside a task of `priority`.
    pub fn run_with_priority<R>(&self, priority: Priority, f: impl FnOnce() -> R) -> R {
        let previous = std::mem::replace(&mut self.state.borrow_mut().current_priority, priority);
        let result = f();
        self.state.borrow_mut().current_priority = previous;
        result
    }

    /// The task the host trigger is currently armed for.
    pub fn host_task(&self) -> Option<TaskId> {
        self.state.borrow().host_task
    }

    /// How many times a host trigger has been armed.
    pub fn host_task_requests(&self) -> usize {
        self.state.borrow().host_task_requests
    }

    pub fn pending_count(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.state.borrow().tasks.iter().any(|task| task.id == id)
    }

    pub fn current_task(&self) -> Option<TaskId> {
        self.state.borrow().current_task
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default(), Rc::new(SystemClock::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualClock;
    use std::cell::{Cell, RefCell};

    fn manual() -> (Rc<Scheduler>, ManualClock) {
        let clock = ManualClock::new();
        let scheduler = Rc::new(Scheduler::new(
            SchedulerConfig::default(),
            Rc::new(clock.clone()),
        ));
        (scheduler, clock)
    }

    fn record(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> impl FnOnce(&TaskContext<'_>) -> TaskResult + 'static {
        let log = log.clone();
        move |_ctx| {
            log.borrow_mut().push(name);
            TaskResult::Complete
        }
    }

    #[test]
    fn test_earliest_expiration_runs_first() {
        let (scheduler, _clock) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.schedule_callback(Priority::Low, record(&log, "low"));
        scheduler.schedule_callback(Priority::UserBlocking, record(&log, "user-blocking"));
        scheduler.schedule_callback(Priority::Normal, record(&log, "normal"));

        scheduler.flush_all();
        assert_eq!(*log.borrow(), vec!["user-blocking", "normal", "low"]);
    }

    #[test]
    fn test_aging_beats_priority() {
        let (scheduler, clock) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));

        // Normal at t=0 expires at 5s.
        scheduler.schedule_callback(Priority::Normal, record(&log, "old-normal"));
        // User-blocking at t=6s expires at 6.25s.
        clock.advance(Duration::from_secs(6));
        scheduler.schedule_callback(Priority::UserBlocking, record(&log, "new-user-blocking"));

        scheduler.flush_all();
        assert_eq!(*log.borrow(), vec!["old-normal", "new-user-blocking"]);
    }

    #[test]
    fn test_preemption_rearms_host_task_without_dropping() {
        let (scheduler, _clock) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));

        let low = scheduler.schedule_callback(Priority::Low, record(&log, "low"));
        assert_eq!(scheduler.host_task(), Some(low));
        assert_eq!(scheduler.host_task_requests(), 1);

        let high = scheduler.schedule_callback(Priority::UserBlocking, record(&log, "high"));
        assert_eq!(scheduler.host_task(), Some(high));
        assert_eq!(scheduler.host_task_requests(), 2);
        assert!(scheduler.is_pending(low));

        // Not the new front: the existing trigger keeps being used.
        scheduler.schedule_callback(Priority::Idle, record(&log, "idle"));
        assert_eq!(scheduler.host_task(), Some(high));
        assert_eq!(scheduler.host_task_requests(), 2);

        scheduler.flush_all();
        assert_eq!(*log.borrow(), vec!["high", "low", "idle"]);
    }

    #[test]
    fn test_cancel_pending_task() {
        let (scheduler, _clock) = manual();
        let log = Rc::new(RefCell::new(Vec::new()));

        let a = scheduler.schedule_callback(Priority::Normal, record(&log, "a"));
        scheduler.schedule_callback(Priority::Normal, record(&log, "b"));

        assert!(scheduler.cancel_callback(a));
        assert!(!scheduler.cancel_callback(a));
        assert_eq!(scheduler.pending_count(), 1);

        scheduler.flush_all();
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn test_yield_and_continue() {
        let (scheduler, clock) = manual();
        let remaining = Rc::new(Cell::new(10));
        let slices = Rc::new(Cell::new(0));

        fn perform(
            remaining: Rc<Cell<u32>>,
            slices: Rc<Cell<u32>>,
            clock: ManualClock,
        ) -> impl FnOnce(&TaskContext<'_>) -> TaskResult + 'static {
            move |ctx| {
                slices.set(slices.get() + 1);
                while remaining.get() > 0 {
                    if ctx.should_yield() {
                        return TaskResult::Continue(Box::new(perform(remaining, slices, clock)));
                    }
                    remaining.set(remaining.get() - 1);
                    // Each unit of work costs 2ms; the budget is 5ms.
                    clock.advance(Duration::from_millis(2));
                }
                TaskResult::Complete
            }
        }

        let id = scheduler.schedule_callback(
            Priority::Normal,
            perform(remaining.clone(), slices.clone(), clock.clone()),
        );

        assert!(scheduler.run_host_task());
        assert_eq!(remaining.get(), 7);
        assert!(scheduler.is_pending(id));

        scheduler.flush_all();
        assert_eq!(remaining.get(), 0);
        assert_eq!(slices.get(), 4);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_cancelling_running_task_drops_continuation() {
        let (scheduler, _clock) = manual();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        scheduler.schedule_callback(Priority::Normal, move |ctx| {
            runs_clone.set(runs_clone.get() + 1);
            assert!(!ctx.scheduler().cancel_callback(ctx.task_id()));
            assert!(ctx.should_yield());
            TaskResult::Continue(Box::new(|_ctx| TaskResult::Complete))
        });

        scheduler.flush_all();
        assert_eq!(runs.get(), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_expired_task_reports_timeout() {
        let (scheduler, clock) = manual();
        let timed_out = Rc::new(Cell::new(false));
        let timed_out_clone = timed_out.clone();

        scheduler.schedule_callback(Priority::UserBlocking, move |ctx| {
            timed_out_clone.set(ctx.did_timeout());
            TaskResult::Complete
        });
        clock.advance(Duration::from_millis(300));

        scheduler.flush_all();
        assert!(timed_out.get());
    }

    #[test]
    fn test_current_priority_inside_task() {
        let (scheduler, _clock) = manual();
        let seen = Rc::new(Cell::new(Priority::Normal));
        let seen_clone = seen.clone();

        scheduler.schedule_callback(Priority::Idle, move |ctx| {
            seen_clone.set(ctx.scheduler().current_priority_level());
            TaskResult::Complete
        });
        scheduler.flush_all();

        assert_eq!(seen.get(), Priority::Idle);
        assert_eq!(scheduler.current_priority_level(), Priority::Normal);
        assert_eq!(
            scheduler.run_with_priority(Priority::Low, || scheduler.current_priority_level()),
            Priority::Low
        );
    }
}
