//! Hooks - component-local state and effects.
//!
//! A function component receives a [`Hooks`] context for the duration of
//! one render. Hooks are matched to the previous render by call position:
//! the n-th hook call of this render pairs with the n-th hook of the
//! committed fiber. A component must call the same hooks in the same order
//! every time; anything else is a [`ReconcileError`].
//!
//! # Example
//!
//! ```ignore
//! fn counter(hooks: &mut Hooks, _props: &Props) -> RenderResult<Child> {
//!     let (count, set_count) = hooks.use_state(0)?;
//!
//!     hooks.use_effect(
//!         move || {
//!             println!("count is {count}");
//!             None
//!         },
//!         Some(vec![count.into()]),
//!     )?;
//!
//!     Ok(Element::host("button").child(count).into())
//! }
//! ```

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::fiber::FiberId;
use super::flags::HookFlags;
use crate::element::Value;
use crate::error::{ReconcileError, RenderResult};
use crate::lanes::{request_update_lane, Lane};
use crate::update_queue::{Action, ProcessedQueue, Update, UpdateQueue};

/// Cleanup returned by an effect.
pub type Destroy = Box<dyn FnOnce()>;

pub(crate) type EffectCallback = Box<dyn FnOnce() -> Option<Destroy>>;

/// Receiver of state updates: the root that owns the fiber.
pub(crate) trait ScheduleUpdate {
    fn schedule_update_on_fiber(&self, fiber: FiberId, lane: Lane) -> RenderResult<()>;
}

// =============================================================================
// Records
// =============================================================================

/// One effect registration.
pub struct Effect {
    pub(crate) tags: Cell<HookFlags>,
    create: RefCell<Option<EffectCallback>>,
    /// Shared by every generation of the same hook position.
    destroy: Rc<RefCell<Option<Destroy>>>,
    deps: Option<Vec<Value>>,
}

impl Effect {
    pub(crate) fn has_tags(&self, tags: HookFlags) -> bool {
        self.tags.get().contains(tags)
    }

    /// Run the stored cleanup, if any.
    pub(crate) fn run_destroy(&self) {
        let destroy = self.destroy.borrow_mut().take();
        if let Some(destroy) = destroy {
            destroy();
        }
    }

    /// Run the setup and store its cleanup.
    pub(crate) fn run_create(&self) {
        let create = self.create.borrow_mut().take();
        if let Some(create) = create {
            let destroy = create();
            *self.destroy.borrow_mut() = destroy;
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("tags", &self.tags.get())
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}

/// One hook cell of a fiber.
#[derive(Clone)]
pub enum Hook {
    /// The `T` base state and its `Rc<UpdateQueue<T>>`. The rendered value
    /// is the base with the queue folded over it.
    State {
        base: Rc<dyn Any>,
        queue: Rc<dyn Any>,
    },
    Effect(Rc<Effect>),
}

fn deps_equal(next: Option<&[Value]>, prev: Option<&[Value]>) -> bool {
    match (next, prev) {
        (Some(next), Some(prev)) => next == prev,
        _ => false,
    }
}

// =============================================================================
// Render context
// =============================================================================

/// Hook context for one component render.
pub struct Hooks {
    fiber: FiberId,
    root: Weak<dyn ScheduleUpdate>,
    render_lane: Lane,
    /// Hooks of the committed generation; `None` on mount.
    previous: Option<Vec<Hook>>,
    rendered: Vec<Hook>,
    processed: Vec<ProcessedQueue>,
    has_passive_effect: bool,
}

/// What a finished render leaves on the fiber.
pub(crate) struct RenderedHooks {
    pub(crate) hooks: Vec<Hook>,
    pub(crate) effects: Vec<Rc<Effect>>,
    pub(crate) processed: Vec<ProcessedQueue>,
    pub(crate) has_passive_effect: bool,
}

impl Hooks {
    pub(crate) fn new(
        fiber: FiberId,
        root: Weak<dyn ScheduleUpdate>,
        render_lane: Lane,
        previous: Option<Vec<Hook>>,
    ) -> Self {
        Self {
            fiber,
            root,
            render_lane,
            previous,
            rendered: Vec::new(),
            processed: Vec::new(),
            has_passive_effect: false,
        }
    }

    /// True on the first render of this component instance.
    pub fn is_mount(&self) -> bool {
        self.previous.is_none()
    }

    /// The previous hook at the next position, or `None` on mount.
    fn previous_hook(&self) -> RenderResult<Option<&Hook>> {
        let index = self.rendered.len();
        if self.is_mount() {
            return Ok(None);
        }
        self.previous
            .as_ref()
            .and_then(|previous| previous.get(index))
            .map(Some)
            .ok_or(ReconcileError::TooManyHooks { index })
    }

    /// Register a state cell.
    ///
    /// Returns the current value and a setter. On update the value is the
    /// base state with every queued update for this render's lane applied in
    /// order. The base only moves past updates a render has applied, so an
    /// update skipped at a lower lane is folded in ahead of later ones.
    pub fn use_state<T: Clone + 'static>(&mut self, initial: T) -> RenderResult<(T, SetState<T>)> {
        let index = self.rendered.len();

        let (state, base, queue) = match self.previous_hook()? {
            None => (initial.clone(), initial, Rc::new(UpdateQueue::new())),
            Some(Hook::State { base, queue }) => {
                let mismatch = || ReconcileError::HookMismatch {
                    index,
                    expected: "use_state",
                };
                let base = base.downcast_ref::<T>().ok_or_else(mismatch)?.clone();
                let queue = Rc::clone(queue)
                    .downcast::<UpdateQueue<T>>()
                    .map_err(|_| mismatch())?;

                let processed = queue.process(base, self.render_lane);
                if processed.seen > 0 {
                    self.processed.push(ProcessedQueue {
                        queue: queue.clone(),
                        seen: processed.seen,
                    });
                }
                (processed.state, processed.base, queue)
            }
            Some(Hook::Effect(_)) => {
                return Err(ReconcileError::HookMismatch {
                    index,
                    expected: "use_state",
                })
            }
        };

        self.rendered.push(Hook::State {
            base: Rc::new(base),
            queue: queue.clone(),
        });

        let setter = SetState {
            root: self.root.clone(),
            fiber: self.fiber,
            queue,
        };
        Ok((state, setter))
    }

    /// Register a passive effect.
    ///
    /// `create` runs after the render commits. With `deps: None` it runs
    /// after every commit; otherwise only when `deps` differ from the
    /// previous render. The cleanup it returns runs before the next `create`
    /// of this hook and when the component unmounts.
    pub fn use_effect<F>(&mut self, create: F, deps: Option<Vec<Value>>) -> RenderResult<()>
    where
        F: FnOnce() -> Option<Destroy> + 'static,
    {
        let index = self.rendered.len();

        let (destroy, fire) = match self.previous_hook()? {
            None => (Rc::new(RefCell::new(None)), true),
            Some(Hook::Effect(previous)) => {
                let same = deps_equal(deps.as_deref(), previous.deps.as_deref());
                (previous.destroy.clone(), !same)
            }
            Some(Hook::State { .. }) => {
                return Err(ReconcileError::HookMismatch {
                    index,
                    expected: "use_effect",
                })
            }
        };

        let tags = if fire {
            self.has_passive_effect = true;
            HookFlags::PASSIVE | HookFlags::HAS_EFFECT
        } else {
            HookFlags::PASSIVE
        };

        let create: EffectCallback = Box::new(create);
        self.rendered.push(Hook::Effect(Rc::new(Effect {
            tags: Cell::new(tags),
            create: RefCell::new(Some(create)),
            destroy,
            deps,
        })));
        Ok(())
    }

    /// Close the render and check the hook count against the previous one.
    pub(crate) fn finish(self) -> RenderResult<RenderedHooks> {
        if let Some(previous) = &self.previous {
            if self.rendered.len() < previous.len() {
                return Err(ReconcileError::TooFewHooks {
                    expected: previous.len(),
                    rendered: self.rendered.len(),
                });
            }
        }

        let effects = self
            .rendered
            .iter()
            .filter_map(|hook| match hook {
                Hook::Effect(effect) => Some(effect.clone()),
                Hook::State { .. } => None,
            })
            .collect();

        Ok(RenderedHooks {
            hooks: self.rendered,
            effects,
            processed: self.processed,
            has_passive_effect: self.has_passive_effect,
        })
    }
}

// =============================================================================
// Setter
// =============================================================================

/// Setter returned by [`Hooks::use_state`].
///
/// Every call enqueues an update and schedules a render, even when the new
/// value equals the old one.
pub struct SetState<T> {
    root: Weak<dyn ScheduleUpdate>,
    fiber: FiberId,
    queue: Rc<UpdateQueue<T>>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            fiber: self.fiber,
            queue: self.queue.clone(),
        }
    }
}

impl<T> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetState").field("fiber", &self.fiber).finish()
    }
}

impl<T: Clone + 'static> SetState<T> {
    /// Replace the state.
    pub fn set(&self, value: T) -> RenderResult<()> {
        self.dispatch(Action::Replace(value))
    }

    /// Derive the next state from the accumulated one.
    pub fn update(&self, f: impl Fn(&T) -> T + 'static) -> RenderResult<()> {
        self.dispatch(Action::Reduce(Rc::new(f)))
    }

    fn dispatch(&self, action: Action<T>) -> RenderResult<()> {
        let Some(root) = self.root.upgrade() else {
            log::warn!("state update after the root was dropped");
            return Err(ReconcileError::Unmounted);
        };
        let lane = request_update_lane();
        // Scheduling only marks lanes, so the update can follow it; a freed
        // fiber is rejected before anything lands on its queue.
        root.schedule_update_on_fiber(self.fiber, lane)?;
        self.queue.enqueue(Update::new(action, lane));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::Lanes;
    use slotmap::KeyData;

    struct Recorder(RefCell<Vec<(FiberId, Lane)>>);

    impl ScheduleUpdate for Recorder {
        fn schedule_update_on_fiber(&self, fiber: FiberId, lane: Lane) -> RenderResult<()> {
            self.0.borrow_mut().push((fiber, lane));
            Ok(())
        }
    }

    /// Rejects every update, like a root whose fiber has been freed.
    struct Freed;

    impl ScheduleUpdate for Freed {
        fn schedule_update_on_fiber(&self, _fiber: FiberId, _lane: Lane) -> RenderResult<()> {
            Err(ReconcileError::Unmounted)
        }
    }

    fn fiber() -> FiberId {
        FiberId::from(KeyData::from_ffi(1))
    }

    fn hooks(root: &Rc<Recorder>, previous: Option<Vec<Hook>>) -> Hooks {
        hooks_at(root, previous, Lanes::SYNC)
    }

    fn hooks_at(root: &Rc<Recorder>, previous: Option<Vec<Hook>>, lane: Lane) -> Hooks {
        let root: Rc<dyn ScheduleUpdate> = root.clone();
        Hooks::new(fiber(), Rc::downgrade(&root), lane, previous)
    }

    #[test]
    fn test_state_survives_between_renders() {
        let root = Rc::new(Recorder(RefCell::new(Vec::new())));

        let mut first = hooks(&root, None);
        let (value, set) = first.use_state(1).unwrap();
        assert_eq!(value, 1);
        let rendered = first.finish().unwrap();

        set.update(|n| n + 10).unwrap();
        set.set(5).unwrap();
        assert_eq!(root.0.borrow().len(), 2);

        let mut second = hooks(&root, Some(rendered.hooks));
        let (value, _) = second.use_state(1).unwrap();
        assert_eq!(value, 5);
        let rendered = second.finish().unwrap();
        assert_eq!(rendered.processed.len(), 1);
        assert_eq!(rendered.processed[0].seen, 2);
    }

    #[test]
    fn test_hook_count_checks() {
        let root = Rc::new(Recorder(RefCell::new(Vec::new())));

        let mut first = hooks(&root, None);
        first.use_state(0).unwrap();
        first.use_state("x").unwrap();
        let rendered = first.finish().unwrap();

        let mut fewer = hooks(&root, Some(rendered.hooks.clone()));
        fewer.use_state(0).unwrap();
        assert_eq!(
            fewer.finish().err(),
            Some(ReconcileError::TooFewHooks { expected: 2, rendered: 1 })
        );

        let mut more = hooks(&root, Some(rendered.hooks.clone()));
        more.use_state(0).unwrap();
        more.use_state("x").unwrap();
        assert_eq!(
            more.use_state(0).err(),
            Some(ReconcileError::TooManyHooks { index: 2 })
        );

        let mut changed = hooks(&root, Some(rendered.hooks));
        assert_eq!(
            changed.use_effect(|| None, None).err(),
            Some(ReconcileError::HookMismatch { index: 0, expected: "use_effect" })
        );
    }

    #[test]
    fn test_state_type_change_is_a_mismatch() {
        let root = Rc::new(Recorder(RefCell::new(Vec::new())));

        let mut first = hooks(&root, None);
        first.use_state(0_i32).unwrap();
        let rendered = first.finish().unwrap();

        let mut second = hooks(&root, Some(rendered.hooks));
        assert_eq!(
            second.use_state(String::new()).err(),
            Some(ReconcileError::HookMismatch { index: 0, expected: "use_state" })
        );
    }

    #[test]
    fn test_effect_fires_only_when_deps_change() {
        let root = Rc::new(Recorder(RefCell::new(Vec::new())));

        let mut first = hooks(&root, None);
        first.use_effect(|| None, Some(vec![1.into()])).unwrap();
        let rendered = first.finish().unwrap();
        assert!(rendered.has_passive_effect);
        assert!(rendered.effects[0].has_tags(HookFlags::HAS_EFFECT));

        let mut same = hooks(&root, Some(rendered.hooks.clone()));
        same.use_effect(|| None, Some(vec![1.into()])).unwrap();
        let unchanged = same.finish().unwrap();
        assert!(!unchanged.has_passive_effect);
        assert!(!unchanged.effects[0].has_tags(HookFlags::HAS_EFFECT));

        let mut always = hooks(&root, Some(rendered.hooks));
        always.use_effect(|| None, None).unwrap();
        assert!(always.finish().unwrap().has_passive_effect);
    }

    #[test]
    fn test_destroy_slot_is_shared_across_generations() {
        let root = Rc::new(Recorder(RefCell::new(Vec::new())));
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut first = hooks(&root, None);
        let sink = log.clone();
        first
            .use_effect(
                move || {
                    sink.borrow_mut().push("create");
                    let sink = sink.clone();
                    Some(Box::new(move || sink.borrow_mut().push("destroy")) as Destroy)
                },
                Some(vec![]),
            )
            .unwrap();
        let rendered = first.finish().unwrap();
        rendered.effects[0].run_create();

        let mut second = hooks(&root, Some(rendered.hooks));
        second.use_effect(|| None, Some(vec![])).unwrap();
        let rendered = second.finish().unwrap();
        rendered.effects[0].run_destroy();

        assert_eq!(*log.borrow(), vec!["create", "destroy"]);
    }

    #[test]
    fn test_setter_on_dropped_root() {
        let root = Rc::new(Recorder(RefCell::new(Vec::new())));
        let mut mount = hooks(&root, None);
        let (_, set) = mount.use_state(0).unwrap();
        drop(mount);
        drop(root);

        assert_eq!(set.set(1), Err(ReconcileError::Unmounted));
    }

    #[test]
    fn test_setter_on_freed_fiber_leaves_queue_empty() {
        let root: Rc<dyn ScheduleUpdate> = Rc::new(Freed);
        let mut mount = Hooks::new(fiber(), Rc::downgrade(&root), Lanes::SYNC, None);
        let (_, set) = mount.use_state(0).unwrap();

        assert_eq!(set.set(1), Err(ReconcileError::Unmounted));
        assert_eq!(set.update(|n| n + 1), Err(ReconcileError::Unmounted));
        assert!(set.queue.is_empty());
    }

    #[test]
    fn test_skipped_update_is_rebased_under_later_ones() {
        let root = Rc::new(Recorder(RefCell::new(Vec::new())));

        let mut mount = hooks(&root, None);
        assert!(mount.is_mount());
        let (_, set) = mount.use_state(0).unwrap();
        let rendered = mount.finish().unwrap();

        crate::lanes::with_update_lane(Lanes::DEFAULT, || set.update(|n| n + 100)).unwrap();
        set.set(5).unwrap();

        let mut sync = hooks_at(&root, Some(rendered.hooks), Lanes::SYNC);
        assert!(!sync.is_mount());
        let (value, _) = sync.use_state(0).unwrap();
        assert_eq!(value, 5);
        let rendered = sync.finish().unwrap();
        for processed in &rendered.processed {
            processed.retire(Lanes::SYNC);
        }

        let mut default = hooks_at(&root, Some(rendered.hooks), Lanes::DEFAULT);
        let (value, _) = default.use_state(0).unwrap();
        assert_eq!(value, 5);
    }
}
