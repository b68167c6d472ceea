//! Commit phase - apply recorded effects to the host tree.
//!
//! # Mutation pass
//!
//! One depth-first walk over the finished tree. Subtrees whose
//! `subtree_flags` carry nothing relevant are skipped. Each visited fiber is
//! handled on the way back up, in a fixed order:
//!
//! 1. `PLACEMENT` - insert or move its host nodes
//! 2. `UPDATE` - apply the prop payload or text change
//! 3. `CHILD_DELETION` - remove deleted subtrees, queue their cleanups
//! 4. `PASSIVE_EFFECT` - queue its effects for the passive flush
//!
//! Every flag is cleared once handled.
//!
//! # Passive flush
//!
//! Runs later at normal priority: all unmount cleanups, then every cleanup
//! of re-fired effects, then every setup.

use std::rc::Rc;

use super::fiber::{FiberArena, FiberId, FiberKind, FiberQueue};
use super::flags::{Flags, HookFlags, MUTATION_MASK, PASSIVE_MASK};
use super::hooks::Effect;
use crate::host::HostConfig;

/// Effect lists waiting for the next passive flush.
#[derive(Default)]
pub(crate) struct PendingPassiveEffects {
    /// Effects of deleted components.
    pub(crate) unmount: Vec<Vec<Rc<Effect>>>,
    /// Effects of components that rendered with a changed dependency.
    pub(crate) update: Vec<Vec<Rc<Effect>>>,
}

impl PendingPassiveEffects {
    pub(crate) fn is_empty(&self) -> bool {
        self.unmount.is_empty() && self.update.is_empty()
    }
}

// =============================================================================
// Mutation pass
// =============================================================================

pub(crate) fn commit_mutation_effects<H: HostConfig>(
    host: &H,
    fibers: &mut FiberArena<H::Instance>,
    passive: &mut PendingPassiveEffects,
    finished_work: FiberId,
) {
    let mut next = Some(finished_work);

    'down: while let Some(mut node) = next {
        let fiber = &fibers[node];
        if fiber.subtree_flags.intersects(MUTATION_MASK | PASSIVE_MASK) {
            if let Some(child) = fiber.child {
                next = Some(child);
                continue;
            }
        }

        loop {
            commit_mutation_effects_on_fiber(host, fibers, passive, node);
            if let Some(sibling) = fibers[node].sibling {
                next = Some(sibling);
                continue 'down;
            }
            match fibers[node].parent {
                Some(parent) => node = parent,
                None => break 'down,
            }
        }
    }
}

fn commit_mutation_effects_on_fiber<H: HostConfig>(
    host: &H,
    fibers: &mut FiberArena<H::Instance>,
    passive: &mut PendingPassiveEffects,
    node: FiberId,
) {
    let flags = fibers[node].flags;

    if flags.contains(Flags::PLACEMENT) {
        commit_placement(host, fibers, node);
        fibers[node].flags.remove(Flags::PLACEMENT);
    }

    if flags.contains(Flags::UPDATE) {
        commit_update(host, fibers, node);
        fibers[node].flags.remove(Flags::UPDATE);
    }

    if flags.contains(Flags::CHILD_DELETION) {
        for deleted in std::mem::take(&mut fibers[node].deletions) {
            commit_deletion(host, fibers, passive, deleted);
        }
        fibers[node].flags.remove(Flags::CHILD_DELETION);
    }

    if flags.contains(Flags::PASSIVE_EFFECT) {
        collect_passive_effects(fibers, node, &mut passive.update);
        fibers[node].flags.remove(Flags::PASSIVE_EFFECT);
    }
}

// =============================================================================
// Placement
// =============================================================================

fn commit_placement<H: HostConfig>(host: &H, fibers: &FiberArena<H::Instance>, node: FiberId) {
    let Some(parent) = get_host_parent(fibers, node) else {
        log::warn!("no host parent for placed fiber {node:?}");
        return;
    };
    let before = get_host_sibling(fibers, node);
    insert_or_append_placement_node(host, fibers, node, &parent, before.as_ref());
}

/// Instance of the nearest host ancestor (the container for the root).
fn get_host_parent<I: Clone>(fibers: &FiberArena<I>, node: FiberId) -> Option<I> {
    let mut parent = fibers.get(node)?.parent;
    while let Some(id) = parent {
        let fiber = fibers.get(id)?;
        match fiber.kind {
            FiberKind::HostComponent(_) | FiberKind::HostRoot => return fiber.state_node.clone(),
            _ => parent = fiber.parent,
        }
    }
    None
}

/// First host node after `node` in document order that is already in place.
fn get_host_sibling<I: Clone>(fibers: &FiberArena<I>, node: FiberId) -> Option<I> {
    let mut node = node;

    'siblings: loop {
        while fibers[node].sibling.is_none() {
            let parent = fibers[node].parent?;
            if matches!(
                fibers[parent].kind,
                FiberKind::HostComponent(_) | FiberKind::HostRoot
            ) {
                return None;
            }
            node = parent;
        }
        node = fibers[node].sibling?;

        while !fibers[node].kind.is_host() {
            if fibers[node].flags.contains(Flags::PLACEMENT) {
                continue 'siblings;
            }
            match fibers[node].child {
                Some(child) => node = child,
                None => continue 'siblings,
            }
        }

        if !fibers[node].flags.contains(Flags::PLACEMENT) {
            return fibers[node].state_node.clone();
        }
    }
}

fn insert_or_append_placement_node<H: HostConfig>(
    host: &H,
    fibers: &FiberArena<H::Instance>,
    node: FiberId,
    parent: &H::Instance,
    before: Option<&H::Instance>,
) {
    let fiber = &fibers[node];
    if fiber.kind.is_host() {
        if let Some(instance) = &fiber.state_node {
            match before {
                Some(before) => host.insert_child_to_container(parent, instance, before),
                None => host.append_child_to_container(parent, instance),
            }
        }
        return;
    }

    let mut child = fiber.child;
    while let Some(id) = child {
        insert_or_append_placement_node(host, fibers, id, parent, before);
        child = fibers[id].sibling;
    }
}

// =============================================================================
// Update
// =============================================================================

fn commit_update<H: HostConfig>(host: &H, fibers: &mut FiberArena<H::Instance>, node: FiberId) {
    let alternate = fibers[node].alternate;
    let fiber = &mut fibers[node];
    let Some(instance) = fiber.state_node.clone() else {
        log::warn!("update on fiber {node:?} without a host node");
        return;
    };

    match fiber.kind.clone() {
        FiberKind::HostComponent(tag) => {
            if let FiberQueue::HostUpdate(payload) = std::mem::take(&mut fiber.update_queue) {
                let props = fiber.memoized_props.as_element().cloned().unwrap_or_default();
                host.commit_update(&instance, &tag, &payload, &props);
            }
        }
        FiberKind::HostText => {
            let new = fiber.memoized_props.as_text().cloned().unwrap_or_else(|| Rc::from(""));
            let old = alternate
                .and_then(|current| fibers[current].memoized_props.as_text().cloned())
                .unwrap_or_else(|| Rc::from(""));
            host.commit_text_update(&instance, &old, &new);
        }
        other => log::warn!("unexpected update flag on {:?}", other.tag()),
    }
}

// =============================================================================
// Deletion
// =============================================================================

/// Remove a deleted subtree from the host tree, queue the cleanups of every
/// component inside it and release its fibers.
fn commit_deletion<H: HostConfig>(
    host: &H,
    fibers: &mut FiberArena<H::Instance>,
    passive: &mut PendingPassiveEffects,
    deleted: FiberId,
) {
    // Host nodes with no host ancestor inside the subtree, in document order.
    let mut host_roots = Vec::new();
    let mut stack = vec![(deleted, false)];

    while let Some((id, inside_host)) = stack.pop() {
        let fiber = &fibers[id];
        match &fiber.kind {
            FiberKind::HostComponent(_) | FiberKind::HostText if !inside_host => {
                if let Some(instance) = &fiber.state_node {
                    host_roots.push(instance.clone());
                }
            }
            FiberKind::FunctionComponent(_) => {
                if let FiberQueue::Effects(effects) = &fiber.update_queue {
                    passive.unmount.push(effects.clone());
                }
            }
            _ => {}
        }

        let inside_host = inside_host || fiber.kind.is_host();
        for child in fibers.children(id).into_iter().rev() {
            stack.push((child, inside_host));
        }
    }

    if !host_roots.is_empty() {
        match get_host_parent(fibers, deleted) {
            Some(parent) => {
                for instance in &host_roots {
                    host.remove_child(instance, &parent);
                }
            }
            None => log::warn!("no host parent for deleted fiber {deleted:?}"),
        }
    }

    fibers.free_subtree(deleted);
}

// =============================================================================
// Passive effects
// =============================================================================

fn collect_passive_effects<I>(
    fibers: &FiberArena<I>,
    node: FiberId,
    into: &mut Vec<Vec<Rc<Effect>>>,
) {
    let fiber = &fibers[node];
    if !matches!(fiber.kind, FiberKind::FunctionComponent(_)) {
        return;
    }
    match &fiber.update_queue {
        FiberQueue::Effects(effects) => into.push(effects.clone()),
        _ => log::warn!("passive flag on fiber {node:?} without an effect list"),
    }
}

/// Run queued effects. Returns true if anything was queued.
pub(crate) fn run_passive_effects(pending: PendingPassiveEffects) -> bool {
    if pending.is_empty() {
        return false;
    }

    for effects in &pending.unmount {
        commit_hook_effect_list_unmount(HookFlags::PASSIVE, effects);
    }
    for effects in &pending.update {
        commit_hook_effect_list_destroy(HookFlags::PASSIVE | HookFlags::HAS_EFFECT, effects);
    }
    for effects in &pending.update {
        commit_hook_effect_list_create(HookFlags::PASSIVE | HookFlags::HAS_EFFECT, effects);
    }
    true
}

fn commit_hook_effect_list_unmount(tags: HookFlags, effects: &[Rc<Effect>]) {
    for effect in effects.iter().filter(|effect| effect.has_tags(tags)) {
        effect.run_destroy();
        effect.tags.set(effect.tags.get() - HookFlags::HAS_EFFECT);
    }
}

fn commit_hook_effect_list_destroy(tags: HookFlags, effects: &[Rc<Effect>]) {
    for effect in effects.iter().filter(|effect| effect.has_tags(tags)) {
        effect.run_destroy();
    }
}

fn commit_hook_effect_list_create(tags: HookFlags, effects: &[Rc<Effect>]) {
    for effect in effects.iter().filter(|effect| effect.has_tags(tags)) {
        effect.run_create();
    }
}
