//! Work nodes (fibers) and the arena that owns both generations.
//!
//! Every fiber lives in one generational arena and refers to its neighbours
//! by [`FiberId`]. Each tree position has at most two fibers: the committed
//! one (`current`) and the one being rendered (`work-in-progress`), paired
//! through `alternate`. A render reuses the alternate when it exists instead
//! of allocating.
//!
//! ```text
//!           HostRoot <──alternate──> HostRoot
//!              │child                   │child
//!              ▼                        ▼
//!            div ──sibling──> p       div ──sibling──> p
//!           (current)               (work-in-progress)
//! ```
//!
//! Fresh allocations made during a render pass are remembered, so an
//! abandoned pass can release them with [`FiberArena::discard_fresh`].

use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use super::flags::Flags;
use super::hooks::{Effect, Hook};
use crate::element::{Child, ComponentType, Element, ElementType, Key, PropChange, Props};
use crate::lanes::{Lanes, NO_LANES};
use crate::update_queue::UpdateQueue;

new_key_type! {
    /// Handle to a fiber in the arena.
    pub struct FiberId;
}

// =============================================================================
// Kinds
// =============================================================================

/// What a fiber represents, with the data each kind needs.
#[derive(Debug, Clone)]
pub enum FiberKind {
    HostRoot,
    HostComponent(Rc<str>),
    HostText,
    FunctionComponent(ComponentType),
    Fragment,
}

/// Data-free view of [`FiberKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkTag {
    HostRoot,
    HostComponent,
    HostText,
    FunctionComponent,
    Fragment,
}

impl FiberKind {
    pub fn tag(&self) -> WorkTag {
        match self {
            Self::HostRoot => WorkTag::HostRoot,
            Self::HostComponent(_) => WorkTag::HostComponent,
            Self::HostText => WorkTag::HostText,
            Self::FunctionComponent(_) => WorkTag::FunctionComponent,
            Self::Fragment => WorkTag::Fragment,
        }
    }

    /// Host components and text own a host node.
    pub fn is_host(&self) -> bool {
        matches!(self, Self::HostComponent(_) | Self::HostText)
    }

    /// Same position type as `element`, so the fiber can be reused for it.
    pub fn matches(&self, element: &ElementType) -> bool {
        match (self, element) {
            (Self::HostComponent(tag), ElementType::Host(other)) => tag == other,
            (Self::FunctionComponent(ty), ElementType::Component(other)) => ty == other,
            (Self::Fragment, ElementType::Fragment) => true,
            _ => false,
        }
    }

    pub(crate) fn from_element(element: &Element) -> Self {
        match element.element_type() {
            ElementType::Host(tag) => Self::HostComponent(tag.clone()),
            ElementType::Component(ty) => Self::FunctionComponent(ty.clone()),
            ElementType::Fragment => Self::Fragment,
        }
    }
}

/// Props as seen by one fiber kind.
#[derive(Debug, Clone, Default)]
pub enum FiberProps {
    #[default]
    Empty,
    /// Host and function components.
    Element(Rc<Props>),
    /// Host text.
    Text(Rc<str>),
    /// Fragments.
    Children(Child),
}

impl FiberProps {
    /// Props to reconcile `element` with.
    pub fn of_element(element: &Element) -> Self {
        match element.element_type() {
            ElementType::Fragment => Self::Children(element.props().children().clone()),
            _ => Self::Element(element.props().clone()),
        }
    }

    pub fn as_element(&self) -> Option<&Rc<Props>> {
        match self {
            Self::Element(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Rc<str>> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Kind-specific memoized state.
#[derive(Clone, Default)]
pub enum MemoizedState {
    #[default]
    None,
    /// Host root: the element tree its queue is folded over. It trails the
    /// rendered tree while a skipped update is still queued.
    Root(Child),
    /// Function component: its hook list in call order.
    Hooks(Vec<Hook>),
}

/// Kind-specific update queue.
#[derive(Clone, Default)]
pub enum FiberQueue {
    #[default]
    None,
    /// Host root: queued element trees.
    Root(Rc<UpdateQueue<Child>>),
    /// Function component: effect records of the last render.
    Effects(Vec<Rc<Effect>>),
    /// Host component: prop payload waiting for commit.
    HostUpdate(Vec<PropChange>),
}

// =============================================================================
// Fiber
// =============================================================================

/// One tree position for one generation.
pub struct Fiber<I> {
    pub kind: FiberKind,
    pub key: Option<Key>,
    pub pending_props: FiberProps,
    pub memoized_props: FiberProps,
    pub memoized_state: MemoizedState,
    pub update_queue: FiberQueue,
    pub state_node: Option<I>,

    pub parent: Option<FiberId>,
    pub child: Option<FiberId>,
    pub sibling: Option<FiberId>,
    pub index: usize,

    pub flags: Flags,
    pub subtree_flags: Flags,
    pub deletions: Vec<FiberId>,

    pub alternate: Option<FiberId>,
    pub lanes: Lanes,
}

impl<I> Fiber<I> {
    pub fn new(kind: FiberKind, key: Option<Key>, pending_props: FiberProps) -> Self {
        Self {
            kind,
            key,
            pending_props,
            memoized_props: FiberProps::Empty,
            memoized_state: MemoizedState::None,
            update_queue: FiberQueue::None,
            state_node: None,
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            flags: Flags::empty(),
            subtree_flags: Flags::empty(),
            deletions: Vec::new(),
            alternate: None,
            lanes: NO_LANES,
        }
    }

    pub fn tag(&self) -> WorkTag {
        self.kind.tag()
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Owner of every fiber of one root.
pub struct FiberArena<I> {
    fibers: SlotMap<FiberId, Fiber<I>>,
    fresh: Vec<FiberId>,
}

impl<I> Default for FiberArena<I> {
    fn default() -> Self {
        Self {
            fibers: SlotMap::with_key(),
            fresh: Vec::new(),
        }
    }
}

impl<I: Clone> FiberArena<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber<I>> {
        self.fibers.get(id)
    }

    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<I>> {
        self.fibers.get_mut(id)
    }

    pub fn contains(&self, id: FiberId) -> bool {
        self.fibers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    /// Insert a fiber outside any render pass (the root pair).
    pub fn insert(&mut self, fiber: Fiber<I>) -> FiberId {
        self.fibers.insert(fiber)
    }

    /// Allocate a fiber during a render pass.
    fn create(&mut self, fiber: Fiber<I>) -> FiberId {
        let id = self.fibers.insert(fiber);
        self.fresh.push(id);
        id
    }

    pub fn create_from_element(&mut self, element: &Element) -> FiberId {
        self.create(Fiber::new(
            FiberKind::from_element(element),
            element.key_ref().cloned(),
            FiberProps::of_element(element),
        ))
    }

    pub fn create_from_fragment(&mut self, children: Child, key: Option<Key>) -> FiberId {
        self.create(Fiber::new(
            FiberKind::Fragment,
            key,
            FiberProps::Children(children),
        ))
    }

    pub fn create_from_text(&mut self, content: Rc<str>) -> FiberId {
        self.create(Fiber::new(FiberKind::HostText, None, FiberProps::Text(content)))
    }

    /// Work-in-progress counterpart of `current`, reusing the alternate when
    /// one exists.
    pub fn create_work_in_progress(&mut self, current: FiberId, pending_props: FiberProps) -> FiberId {
        let source = &self.fibers[current];
        let child = source.child;
        let memoized_props = source.memoized_props.clone();
        let memoized_state = source.memoized_state.clone();
        let lanes = source.lanes;
        let update_queue = match &source.update_queue {
            FiberQueue::HostUpdate(_) => FiberQueue::None,
            queue => queue.clone(),
        };

        let wip = match source.alternate {
            Some(wip) => {
                let fiber = &mut self.fibers[wip];
                fiber.pending_props = pending_props;
                fiber.flags = Flags::empty();
                fiber.subtree_flags = Flags::empty();
                fiber.deletions.clear();
                wip
            }
            None => {
                let mut fiber = Fiber::new(source.kind.clone(), source.key.clone(), pending_props);
                fiber.state_node = source.state_node.clone();
                fiber.alternate = Some(current);
                let wip = self.create(fiber);
                self.fibers[current].alternate = Some(wip);
                wip
            }
        };

        let fiber = &mut self.fibers[wip];
        fiber.child = child;
        fiber.memoized_props = memoized_props;
        fiber.memoized_state = memoized_state;
        fiber.update_queue = update_queue;
        fiber.lanes = lanes;
        wip
    }

    /// Forget the fresh allocations of a render pass that committed.
    pub fn commit_fresh(&mut self) {
        self.fresh.clear();
    }

    /// Release the fresh allocations of an abandoned render pass.
    pub fn discard_fresh(&mut self) {
        for id in std::mem::take(&mut self.fresh) {
            let Some(fiber) = self.fibers.remove(id) else {
                continue;
            };
            if let Some(other) = fiber.alternate.and_then(|alt| self.fibers.get_mut(alt)) {
                if other.alternate == Some(id) {
                    other.alternate = None;
                }
            }
        }
    }

    /// Free a deleted subtree and the alternates of its fibers.
    pub fn free_subtree(&mut self, root: FiberId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(fiber) = self.fibers.remove(id) else {
                continue;
            };
            if let Some(alternate) = fiber.alternate {
                self.fibers.remove(alternate);
            }
            if let Some(child) = fiber.child {
                stack.push(child);
            }
            if id != root {
                if let Some(sibling) = fiber.sibling {
                    stack.push(sibling);
                }
            }
        }
    }

    /// Ids of `parent`'s children in sibling order.
    pub fn children(&self, parent: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut next = self.fibers.get(parent).and_then(|fiber| fiber.child);
        while let Some(id) = next {
            out.push(id);
            next = self.fibers[id].sibling;
        }
        out
    }
}

impl<I> std::ops::Index<FiberId> for FiberArena<I> {
    type Output = Fiber<I>;

    fn index(&self, id: FiberId) -> &Fiber<I> {
        &self.fibers[id]
    }
}

impl<I> std::ops::IndexMut<FiberId> for FiberArena<I> {
    fn index_mut(&mut self, id: FiberId) -> &mut Fiber<I> {
        &mut self.fibers[id]
    }
}
