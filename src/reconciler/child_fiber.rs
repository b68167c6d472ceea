//! Child reconciliation - diff new children against the previous fibers.
//!
//! One algorithm, two modes:
//! - **tracking** (updates): deletions are recorded on the parent and new or
//!   moved fibers get `PLACEMENT`.
//! - **mount**: there is nothing to diff against, so only fibers are built.
//!
//! # Single child
//!
//! Walk the previous siblings. Same key and same type reuses the fiber and
//! deletes the rest. Same key but another type deletes everything. A key
//! mismatch deletes that one fiber and keeps looking.
//!
//! # Lists
//!
//! Previous children are indexed by key (or position when unkeyed). Each new
//! child looks up its match; a reused fiber whose old index is below the
//! running `last_placed_index` is marked as moved. Whatever is left in the
//! map is deleted.

use std::collections::HashMap;
use std::rc::Rc;

use super::fiber::{FiberArena, FiberId, FiberKind, FiberProps};
use super::flags::Flags;
use crate::element::{Child, Element, ElementType, Key};

/// Diff `new_child` against the fibers starting at `current_first_child`.
/// Returns the first fiber of the new child list.
pub(crate) fn reconcile_child_fibers<I: Clone>(
    fibers: &mut FiberArena<I>,
    return_fiber: FiberId,
    current_first_child: Option<FiberId>,
    new_child: &Child,
    should_track_effects: bool,
) -> Option<FiberId> {
    let mut reconciler = ChildReconciler {
        fibers,
        should_track_effects,
    };

    // An unkeyed fragment at the top level is just its children.
    let new_child = match new_child {
        Child::Element(element)
            if *element.element_type() == ElementType::Fragment && element.key_ref().is_none() =>
        {
            element.props().children()
        }
        other => other,
    };

    match new_child {
        Child::Element(element) => {
            let fiber = reconciler.reconcile_single_element(return_fiber, current_first_child, element);
            Some(reconciler.place_single_child(fiber))
        }
        Child::Text(content) => {
            let fiber =
                reconciler.reconcile_single_text_node(return_fiber, current_first_child, content);
            Some(reconciler.place_single_child(fiber))
        }
        Child::List(children) => {
            reconciler.reconcile_children_array(return_fiber, current_first_child, children)
        }
        Child::Empty => {
            reconciler.delete_remaining_children(return_fiber, current_first_child);
            None
        }
    }
}

/// Lookup key for previous children in the list path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ChildKey {
    Key(Key),
    Index(usize),
}

struct ChildReconciler<'a, I> {
    fibers: &'a mut FiberArena<I>,
    should_track_effects: bool,
}

impl<I: Clone> ChildReconciler<'_, I> {
    fn delete_child(&mut self, return_fiber: FiberId, child: FiberId) {
        if !self.should_track_effects {
            return;
        }
        let parent = &mut self.fibers[return_fiber];
        parent.deletions.push(child);
        parent.flags |= Flags::CHILD_DELETION;
    }

    fn delete_remaining_children(&mut self, return_fiber: FiberId, first: Option<FiberId>) {
        if !self.should_track_effects {
            return;
        }
        let mut next = first;
        while let Some(child) = next {
            self.delete_child(return_fiber, child);
            next = self.fibers[child].sibling;
        }
    }

    /// Reuse `fiber` as the single child of its position with new props.
    fn use_fiber(&mut self, fiber: FiberId, pending_props: FiberProps) -> FiberId {
        let clone = self.fibers.create_work_in_progress(fiber, pending_props);
        let node = &mut self.fibers[clone];
        node.index = 0;
        node.sibling = None;
        clone
    }

    /// Reuse `fiber` for `element`. The kind is taken from the element, so
    /// a component closure with new captures replaces the old one.
    fn use_element_fiber(&mut self, fiber: FiberId, element: &Element) -> FiberId {
        let clone = self.use_fiber(fiber, FiberProps::of_element(element));
        self.fibers[clone].kind = FiberKind::from_element(element);
        clone
    }

    fn place_single_child(&mut self, fiber: FiberId) -> FiberId {
        let node = &mut self.fibers[fiber];
        if self.should_track_effects && node.alternate.is_none() {
            node.flags |= Flags::PLACEMENT;
        }
        fiber
    }

    // =========================================================================
    // Single child
    // =========================================================================

    fn reconcile_single_element(
        &mut self,
        return_fiber: FiberId,
        current_first_child: Option<FiberId>,
        element: &Element,
    ) -> FiberId {
        let key = element.key_ref();
        let mut current = current_first_child;

        while let Some(candidate) = current {
            let fiber = &self.fibers[candidate];
            let next = fiber.sibling;

            if fiber.key.as_ref() != key {
                self.delete_child(return_fiber, candidate);
                current = next;
                continue;
            }

            if fiber.kind.matches(element.element_type()) {
                let existing = self.use_element_fiber(candidate, element);
                self.fibers[existing].parent = Some(return_fiber);
                self.delete_remaining_children(return_fiber, next);
                return existing;
            }

            // Same key, new type: nothing at this position survives.
            self.delete_remaining_children(return_fiber, Some(candidate));
            break;
        }

        let fiber = self.fibers.create_from_element(element);
        self.fibers[fiber].parent = Some(return_fiber);
        fiber
    }

    fn reconcile_single_text_node(
        &mut self,
        return_fiber: FiberId,
        current_first_child: Option<FiberId>,
        content: &Rc<str>,
    ) -> FiberId {
        let mut current = current_first_child;

        while let Some(candidate) = current {
            let next = self.fibers[candidate].sibling;
            if matches!(self.fibers[candidate].kind, FiberKind::HostText) {
                let existing = self.use_fiber(candidate, FiberProps::Text(content.clone()));
                self.fibers[existing].parent = Some(return_fiber);
                self.delete_remaining_children(return_fiber, next);
                return existing;
            }
            self.delete_child(return_fiber, candidate);
            current = next;
        }

        let fiber = self.fibers.create_from_text(content.clone());
        self.fibers[fiber].parent = Some(return_fiber);
        fiber
    }

    // =========================================================================
    // Lists
    // =========================================================================

    fn reconcile_children_array(
        &mut self,
        return_fiber: FiberId,
        current_first_child: Option<FiberId>,
        children: &[Child],
    ) -> Option<FiberId> {
        let mut existing: HashMap<ChildKey, FiberId> = HashMap::new();
        let mut current = current_first_child;
        while let Some(fiber) = current {
            let node = &self.fibers[fiber];
            let key = match &node.key {
                Some(key) => ChildKey::Key(key.clone()),
                None => ChildKey::Index(node.index),
            };
            existing.insert(key, fiber);
            current = node.sibling;
        }

        let mut last_placed_index = 0;
        let mut first_new_fiber = None;
        let mut last_new_fiber: Option<FiberId> = None;

        for (index, child) in children.iter().enumerate() {
            let Some(new_fiber) = self.update_from_map(&mut existing, index, child) else {
                continue;
            };

            let node = &mut self.fibers[new_fiber];
            node.index = index;
            node.parent = Some(return_fiber);
            let alternate = node.alternate;

            match last_new_fiber {
                Some(last) => self.fibers[last].sibling = Some(new_fiber),
                None => first_new_fiber = Some(new_fiber),
            }
            last_new_fiber = Some(new_fiber);

            if !self.should_track_effects {
                continue;
            }

            match alternate {
                Some(current) => {
                    let old_index = self.fibers[current].index;
                    if old_index < last_placed_index {
                        self.fibers[new_fiber].flags |= Flags::PLACEMENT;
                    } else {
                        last_placed_index = old_index;
                    }
                }
                None => self.fibers[new_fiber].flags |= Flags::PLACEMENT,
            }
        }

        // Keep deletions in previous sibling order.
        let mut leftovers: Vec<FiberId> = existing.into_values().collect();
        leftovers.sort_by_key(|&fiber| self.fibers[fiber].index);
        for fiber in leftovers {
            self.delete_child(return_fiber, fiber);
        }

        first_new_fiber
    }

    fn update_from_map(
        &mut self,
        existing: &mut HashMap<ChildKey, FiberId>,
        index: usize,
        child: &Child,
    ) -> Option<FiberId> {
        let key = match child {
            Child::Element(element) => element
                .key_ref()
                .map_or(ChildKey::Index(index), |key| ChildKey::Key(key.clone())),
            _ => ChildKey::Index(index),
        };
        let before = existing.get(&key).copied();

        match child {
            Child::Text(content) => {
                if let Some(before) = before {
                    if matches!(self.fibers[before].kind, FiberKind::HostText) {
                        existing.remove(&key);
                        return Some(self.use_fiber(before, FiberProps::Text(content.clone())));
                    }
                }
                Some(self.fibers.create_from_text(content.clone()))
            }
            Child::Element(element) => {
                if *element.element_type() == ElementType::Fragment {
                    return Some(self.update_fragment(
                        existing,
                        &key,
                        before,
                        element.props().children().clone(),
                        element.key_ref().cloned(),
                    ));
                }
                if let Some(before) = before {
                    if self.fibers[before].kind.matches(element.element_type()) {
                        existing.remove(&key);
                        return Some(self.use_element_fiber(before, element));
                    }
                }
                Some(self.fibers.create_from_element(element))
            }
            Child::List(_) => Some(self.update_fragment(existing, &key, before, child.clone(), None)),
            Child::Empty => None,
        }
    }

    fn update_fragment(
        &mut self,
        existing: &mut HashMap<ChildKey, FiberId>,
        key: &ChildKey,
        before: Option<FiberId>,
        children: Child,
        fragment_key: Option<Key>,
    ) -> FiberId {
        match before {
            Some(before) if matches!(self.fibers[before].kind, FiberKind::Fragment) => {
                existing.remove(key);
                self.use_fiber(before, FiberProps::Children(children))
            }
            _ => self.fibers.create_from_fragment(children, fragment_key),
        }
    }
}
